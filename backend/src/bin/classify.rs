//! Classifies image files from the command line.
//!
//! ```text
//! classify photo.jpg other.png
//! ```

use agroscan::config::AppConfig;
use agroscan::inference::Model;
use std::process::ExitCode;

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: classify <image>...");
        return ExitCode::from(2);
    }

    let model = match AppConfig::load()
        .map_err(Into::into)
        .and_then(|config| Model::load(&config))
    {
        Ok(model) => model,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut failed = false;
    for path in &paths {
        let outcome = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| model.classify(&bytes).map_err(|e| format!("{} ({})", e, e.kind())));

        match outcome {
            Ok(prediction) => {
                println!(
                    "{}: {} ({:.1}%)\n  {}",
                    path,
                    prediction.label,
                    prediction.confidence,
                    model.advice_for(&prediction)
                );
            }
            Err(message) => {
                failed = true;
                eprintln!("{}: {}", path, message);
            }
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
