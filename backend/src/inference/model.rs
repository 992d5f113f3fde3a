use std::sync::Arc;
use std::time::Instant;

use agroscan_shared::ErrorKind;

use super::classifier::{Classifier, ClassifierError};
use super::decision::decide;
use super::preprocess::{NormalizedTensor, PreprocessError, Preprocessor};
use crate::catalog::{CatalogError, ClassLabel, LabelCatalog, LabelIndexError};
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Image could not be decoded: {0}")]
    Decode(#[from] PreprocessError),
    #[error("Inference failed: {0}")]
    Inference(#[from] ClassifierError),
    #[error("Inference failed: classifier returned no comparable score among {0} values")]
    NoScore(usize),
    #[error("Label lookup failed: {0}")]
    LabelIndex(#[from] LabelIndexError),
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::Decode(_) => ErrorKind::DecodeError,
            ClassifyError::Inference(_) | ClassifyError::NoScore(_) => ErrorKind::InferenceError,
            ClassifyError::LabelIndex(_) => ErrorKind::LabelIndexError,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Model error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Model and label list disagree: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: ClassLabel,
    /// `100 * max(probabilities)`, unrounded.
    pub confidence: f32,
    pub index: usize,
    pub probabilities: Vec<f32>,
}

/// Reduces raw classifier scores to the winning label.
pub fn interpret(
    catalog: &LabelCatalog,
    probabilities: Vec<f32>,
) -> Result<PredictionResult, ClassifyError> {
    let decision = decide(&probabilities).ok_or(ClassifyError::NoScore(probabilities.len()))?;
    let label = catalog.label(decision.index)?.clone();
    Ok(PredictionResult {
        label,
        confidence: decision.confidence,
        index: decision.index,
        probabilities,
    })
}

/// Loaded classifier plus everything needed to feed it and read its output.
/// Built once at startup and shared read-only between requests.
#[derive(Clone)]
pub struct Model {
    classifier: Arc<dyn Classifier>,
    preprocessor: Preprocessor,
    catalog: Arc<LabelCatalog>,
}

impl Model {
    /// Runs the classifier once so an output width that disagrees with the
    /// label list stops startup instead of mislabelling requests.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        preprocessor: Preprocessor,
        catalog: LabelCatalog,
    ) -> Result<Self, StartupError> {
        let width = classifier.output_width(preprocessor.input_shape())?;
        catalog.check_width(width)?;
        log::info!(
            "Model ready: input {:?}, {} classes",
            preprocessor.input_shape(),
            width
        );
        Ok(Self {
            classifier,
            preprocessor,
            catalog: Arc::new(catalog),
        })
    }

    #[cfg(feature = "torch")]
    pub fn load(config: &crate::config::AppConfig) -> Result<Self, StartupError> {
        let classifier = super::torch::TorchClassifier::load(
            &config.model.path,
            config.model.apply_softmax,
        )?;
        Self::new(
            Arc::new(classifier),
            config.preprocessor(),
            config.label_catalog()?,
        )
    }

    pub fn classify(&self, image: &[u8]) -> Result<PredictionResult, ClassifyError> {
        let tensor = self.preprocessor.preprocess(image)?;
        self.classify_tensor(&tensor)
    }

    pub fn classify_tensor(
        &self,
        tensor: &NormalizedTensor,
    ) -> Result<PredictionResult, ClassifyError> {
        let started = Instant::now();
        let probabilities = self.classifier.predict(tensor)?;
        log::debug!(
            "Forward pass took {:.2} ms, {} scores",
            started.elapsed().as_secs_f64() * 1000.0,
            probabilities.len()
        );
        interpret(&self.catalog, probabilities)
    }

    pub fn advice_for(&self, prediction: &PredictionResult) -> &str {
        self.catalog.advice_for(&prediction.label)
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    pub fn input_shape(&self) -> [usize; 4] {
        self.preprocessor.input_shape()
    }
}
