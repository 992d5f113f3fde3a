use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use agroscan::catalog::LabelCatalog;
use agroscan::inference::{Classifier, ClassifierError, Model, NormalizedTensor, Preprocessor};
use agroscan::routes::{configure_routes, image_digest};
use agroscan_shared::{
    ErrorKind, ErrorResponse, HealthResponse, InferenceRequest, InferenceResponse, LabelsResponse,
    UploadResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

const BOUNDARY: &str = "agroscan-test-boundary";

struct StubClassifier(Vec<f32>);

impl Classifier for StubClassifier {
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        assert_eq!(input.shape(), [1, 160, 160, 3]);
        Ok(self.0.clone())
    }
}

fn model(output: Vec<f32>) -> Model {
    let labels = ["Daisy", "Dandelion", "Rose", "Sunflower", "Tulip"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let advice = HashMap::from([
        ("Daisy".to_string(), "Ideal for borders.".to_string()),
        ("Tulip".to_string(), "Plant bulbs in autumn.".to_string()),
    ]);
    let catalog = LabelCatalog::new(labels, advice, "No specific advice.".into()).unwrap();
    Model::new(Arc::new(StubClassifier(output)), Preprocessor::default(), catalog).unwrap()
}

fn png() -> Vec<u8> {
    let image = RgbaImage::from_pixel(400, 250, Rgba([200, 180, 20, 128]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

fn multipart_body(parts: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image{}\"; filename=\"image{}.png\"\r\n",
                i, i
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(part);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

macro_rules! app {
    ($model:expr, $limit:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($model))
                .configure(|cfg| configure_routes(cfg, $limit)),
        )
        .await
    };
}

#[actix_web::test]
async fn base64_upload_returns_daisy() {
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), 1 << 20);
    let req = test::TestRequest::post()
        .uri("/api/classify/base64")
        .set_json(InferenceRequest {
            image_data: STANDARD.encode(png()),
        })
        .to_request();

    let resp: InferenceResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.label, "Daisy");
    assert_eq!(resp.class_index, 0);
    assert!((resp.confidence - 90.0).abs() < 1e-4);
    assert_eq!(resp.advice, "Ideal for borders.");
    assert_eq!(resp.class_labels.len(), 5);
    assert_eq!(resp.predictions.len(), 5);
    assert_eq!(resp.image_digest.to_string().len(), 64);
}

#[actix_web::test]
async fn data_url_prefix_is_accepted() {
    let app = app!(model(vec![0.0, 0.0, 0.0, 0.1, 0.9]), 1 << 20);
    let req = test::TestRequest::post()
        .uri("/api/classify/base64")
        .set_json(InferenceRequest {
            image_data: format!("data:image/png;base64,{}", STANDARD.encode(png())),
        })
        .to_request();

    let resp: InferenceResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.label, "Tulip");
    assert_eq!(resp.advice, "Plant bulbs in autumn.");
}

#[actix_web::test]
async fn tie_picks_first_label_over_http() {
    let app = app!(model(vec![0.5, 0.5, 0.0, 0.0, 0.0]), 1 << 20);
    let req = test::TestRequest::post()
        .uri("/api/classify/base64")
        .set_json(InferenceRequest {
            image_data: STANDARD.encode(png()),
        })
        .to_request();

    let resp: InferenceResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.label, "Daisy");
    assert_eq!(resp.confidence, 50.0);
}

#[actix_web::test]
async fn malformed_image_is_a_decode_error() {
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), 1 << 20);
    let req = test::TestRequest::post()
        .uri("/api/classify/base64")
        .set_json(InferenceRequest {
            image_data: STANDARD.encode(b"not an image at all"),
        })
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.kind, ErrorKind::DecodeError);
    assert!(!body.message.is_empty());
}

#[actix_web::test]
async fn invalid_base64_is_a_bad_request() {
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), 1 << 20);
    let req = test::TestRequest::post()
        .uri("/api/classify/base64")
        .set_json(InferenceRequest {
            image_data: "%%%".into(),
        })
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.kind, ErrorKind::BadRequest);
}

#[actix_web::test]
async fn oversized_base64_image_is_rejected() {
    let image = png();
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), image.len() - 1);
    let req = test::TestRequest::post()
        .uri("/api/classify/base64")
        .set_json(InferenceRequest {
            image_data: STANDARD.encode(&image),
        })
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[actix_web::test]
async fn multipart_parts_are_classified_independently() {
    let app = app!(model(vec![0.1, 0.1, 0.6, 0.1, 0.1]), 1 << 20);
    let image = png();
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(&[&image, b"garbage"]))
        .to_request();

    let resp: UploadResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.results.len(), 2);

    let first = &resp.results[0];
    assert_eq!(first.part, 0);
    assert_eq!(first.image_digest, image_digest(&image));
    let prediction = first.prediction.as_ref().unwrap();
    assert_eq!(prediction.label, "Rose");
    assert_eq!(prediction.advice, "No specific advice.");
    assert_eq!(prediction.request_id, first.request_id);
    assert!(first.error.is_none());

    let second = &resp.results[1];
    assert_eq!(second.part, 1);
    assert_eq!(second.image_digest, image_digest(b"garbage"));
    assert_ne!(second.request_id, first.request_id);
    assert!(second.prediction.is_none());
    let error = second.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::DecodeError);
    assert!(!error.message.is_empty());
}

#[actix_web::test]
async fn many_small_parts_count_against_one_limit() {
    let image = png();
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), image.len() * 3);
    let parts: Vec<&[u8]> = std::iter::repeat_n(image.as_slice(), 50).collect();
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(&parts))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.kind, ErrorKind::PayloadTooLarge);
}

#[actix_web::test]
async fn parts_within_the_total_limit_are_accepted() {
    let image = png();
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), image.len() * 3);
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(&[&image, &image, &image]))
        .to_request();

    let resp: UploadResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.results.len(), 3);
    assert!(resp.results.iter().all(|r| r.prediction.is_some()));
}

#[actix_web::test]
async fn oversized_multipart_part_is_rejected() {
    let app = app!(model(vec![0.9, 0.02, 0.03, 0.04, 0.01]), 16);
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(&[&png()]))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[actix_web::test]
async fn labels_are_listed_in_model_order() {
    let app = app!(model(vec![0.2; 5]), 1 << 20);
    let req = test::TestRequest::get().uri("/api/labels").to_request();

    let resp: LabelsResponse = test::call_and_read_body_json(&app, req).await;
    let names: Vec<&str> = resp.labels.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(names, ["Daisy", "Dandelion", "Rose", "Sunflower", "Tulip"]);
    assert_eq!(resp.labels[1].advice, "No specific advice.");
    assert_eq!(resp.labels[4].index, 4);
    assert_eq!(resp.fallback_advice, "No specific advice.");
}

#[actix_web::test]
async fn health_reports_input_shape() {
    let app = app!(model(vec![0.2; 5]), 1 << 20);
    let req = test::TestRequest::get().uri("/api/health").to_request();

    let resp: HealthResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp.status, "ok");
    assert_eq!(resp.input_shape, [1, 160, 160, 3]);
    assert_eq!(resp.classes, 5);
}
