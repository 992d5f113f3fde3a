use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON body for `POST /api/classify/base64`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InferenceRequest {
    pub image_data: String,
}

/// SHA-256 of the uploaded bytes, hex encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, derive_more::Display, derive_more::From)]
pub struct ImageDigest(pub String);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InferenceResponse {
    pub request_id: Uuid,
    pub image_digest: ImageDigest,
    pub label: String,
    pub class_index: usize,
    /// Percentage in `[0, 100]`, unrounded.
    pub confidence: f32,
    pub advice: String,
    pub predictions: Vec<f32>,
    pub class_labels: Vec<String>,
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
pub enum ErrorKind {
    DecodeError,
    InferenceError,
    LabelIndexError,
    PayloadTooLarge,
    BadRequest,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

/// One multipart part of an upload, classified on its own. Exactly one of
/// `prediction` and `error` is set.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadOutcome {
    pub request_id: Uuid,
    pub part: usize,
    pub image_digest: ImageDigest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<InferenceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadResponse {
    pub results: Vec<UploadOutcome>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LabelEntry {
    pub index: usize,
    pub label: String,
    pub advice: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LabelsResponse {
    pub labels: Vec<LabelEntry>,
    pub fallback_advice: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub input_shape: [usize; 4],
    pub classes: usize,
}
