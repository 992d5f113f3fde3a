use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{Error, HttpResponse, web};
use agroscan_shared::{
    ErrorKind, ErrorResponse, HealthResponse, ImageDigest, InferenceRequest, InferenceResponse,
    LabelEntry, LabelsResponse, UploadOutcome, UploadResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::inference::{Model, PredictionResult};

/// Most image bytes one request may carry, summed over all upload parts.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

pub fn configure_routes(cfg: &mut web::ServiceConfig, max_upload_bytes: usize) {
    // Base64 inflates by 4/3; leave room for the JSON envelope.
    let json_limit = max_upload_bytes / 3 * 4 + 4096;
    cfg.app_data(web::Data::new(UploadLimit(max_upload_bytes)))
        .app_data(web::JsonConfig::default().limit(json_limit))
        .service(web::resource("/api/classify").route(web::post().to(handle_upload)))
        .service(web::resource("/api/classify/base64").route(web::post().to(handle_base64)))
        .service(web::resource("/api/labels").route(web::get().to(list_labels)))
        .service(web::resource("/api/health").route(web::get().to(health)));
}

fn error_response(kind: ErrorKind, message: impl Into<String>) -> HttpResponse {
    let status = match kind {
        ErrorKind::DecodeError | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::InferenceError | ErrorKind::LabelIndexError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    HttpResponse::build(status).json(ErrorResponse {
        kind,
        message: message.into(),
    })
}

fn too_large(limit: usize) -> HttpResponse {
    error_response(
        ErrorKind::PayloadTooLarge,
        format!("Image exceeds the {} byte upload limit", limit),
    )
}

pub fn image_digest(image: &[u8]) -> ImageDigest {
    let mut hasher = Sha256::new();
    hasher.update(image);
    ImageDigest(hex::encode(hasher.finalize()))
}

fn to_response(
    model: &Model,
    request_id: Uuid,
    image_digest: ImageDigest,
    prediction: PredictionResult,
) -> InferenceResponse {
    let advice = model.advice_for(&prediction).to_string();
    InferenceResponse {
        request_id,
        image_digest,
        label: prediction.label.to_string(),
        class_index: prediction.index,
        confidence: prediction.confidence,
        advice,
        predictions: prediction.probabilities,
        class_labels: model
            .catalog()
            .labels()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

/// One image run through the model, tagged for log and client correlation.
struct Classified {
    request_id: Uuid,
    image_digest: ImageDigest,
    outcome: Result<InferenceResponse, ErrorResponse>,
}

/// Classifies one image on the blocking pool. The returned error is an actix
/// failure; per-image failures land in `Classified::outcome`.
async fn run_classification(
    model: &web::Data<Model>,
    image: Vec<u8>,
) -> Result<Classified, Error> {
    let request_id = Uuid::new_v4();
    let digest = image_digest(&image);
    let job_model = model.clone();
    let outcome = web::block(move || job_model.classify(&image)).await?;

    let outcome = match outcome {
        Ok(prediction) => {
            info!(
                "Request {} ({}): {} at {:.1}%",
                request_id, digest, prediction.label, prediction.confidence
            );
            Ok(to_response(model, request_id, digest.clone(), prediction))
        }
        Err(e) => {
            error!("Request {} ({}) failed: {}", request_id, digest, e);
            Err(ErrorResponse {
                kind: e.kind(),
                message: e.to_string(),
            })
        }
    };

    Ok(Classified {
        request_id,
        image_digest: digest,
        outcome,
    })
}

async fn handle_upload(
    model: web::Data<Model>,
    limit: web::Data<UploadLimit>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let mut images: Vec<Vec<u8>> = Vec::new();
    // The cap covers the whole request, not each part.
    let mut buffered = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if buffered + data.len() > limit.0 {
                warn!("Rejected upload larger than {} bytes", limit.0);
                return Ok(too_large(limit.0));
            }
            buffered += data.len();
            image_data.extend_from_slice(&data);
        }
        if !image_data.is_empty() {
            images.push(image_data);
        }
    }

    if images.is_empty() {
        return Ok(error_response(ErrorKind::BadRequest, "No image data in upload"));
    }

    let mut results = Vec::with_capacity(images.len());
    for (part, image_data) in images.into_iter().enumerate() {
        let classified = run_classification(&model, image_data).await?;
        let (prediction, error) = match classified.outcome {
            Ok(prediction) => (Some(prediction), None),
            Err(error) => (None, Some(error)),
        };
        results.push(UploadOutcome {
            request_id: classified.request_id,
            part,
            image_digest: classified.image_digest,
            prediction,
            error,
        });
    }

    Ok(HttpResponse::Ok().json(UploadResponse { results }))
}

async fn handle_base64(
    model: web::Data<Model>,
    limit: web::Data<UploadLimit>,
    request: web::Json<InferenceRequest>,
) -> Result<HttpResponse, Error> {
    let encoded = request.image_data.trim();
    // Accept data URLs as produced by FileReader.readAsDataURL.
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    let image = match STANDARD.decode(encoded) {
        Ok(image) => image,
        Err(e) => {
            return Ok(error_response(
                ErrorKind::BadRequest,
                format!("image_data is not valid base64: {}", e),
            ));
        }
    };
    if image.is_empty() {
        return Ok(error_response(ErrorKind::BadRequest, "image_data is empty"));
    }
    if image.len() > limit.0 {
        return Ok(too_large(limit.0));
    }

    match run_classification(&model, image).await?.outcome {
        Ok(inference) => Ok(HttpResponse::Ok().json(inference)),
        Err(failure) => Ok(error_response(failure.kind, failure.message)),
    }
}

async fn list_labels(model: web::Data<Model>) -> HttpResponse {
    let catalog = model.catalog();
    let labels = catalog
        .labels()
        .iter()
        .enumerate()
        .map(|(index, label)| LabelEntry {
            index,
            label: label.to_string(),
            advice: catalog.advice_for(label).to_string(),
        })
        .collect();

    HttpResponse::Ok().json(LabelsResponse {
        labels,
        fallback_advice: catalog.fallback_advice().to_string(),
    })
}

async fn health(model: web::Data<Model>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".into(),
        input_shape: model.input_shape(),
        classes: model.catalog().len(),
    })
}
