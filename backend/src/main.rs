use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use agroscan::config::AppConfig;
use agroscan::inference::Model;
use agroscan::routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration failed: {}", e))
    })?;

    // Loaded once; every worker shares this handle read-only.
    let model = Model::load(&config).map_err(|e| {
        log::error!("Failed to preload model at startup: {}", e);
        std::io::Error::other(format!("Model loading failed: {}", e))
    })?;
    let model = web::Data::new(model);

    let max_upload_bytes = config.server.max_upload_bytes;
    let bind_address = format!("0.0.0.0:{}", config.server.port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(actix_web::middleware::Logger::default())
            .app_data(model.clone())
            .configure(|cfg| configure_routes(cfg, max_upload_bytes))
    })
    .bind(&bind_address)?
    .run()
    .await
}
