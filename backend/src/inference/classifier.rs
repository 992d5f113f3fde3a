use super::preprocess::NormalizedTensor;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Failed to load model artifact '{path}': {reason}")]
    Load { path: String, reason: String },
    #[error("Model rejected input of shape {shape:?}: {reason}")]
    Forward { shape: [usize; 4], reason: String },
    #[error("Model output could not be read: {0}")]
    Output(String),
    #[error("Model lock poisoned by an earlier panic")]
    Poisoned,
}

/// The pre-trained artifact: one tensor in, one score per class out.
///
/// Implementations must be callable from several request handlers at once;
/// runtimes that are not reentrant serialize internally.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError>;

    /// Number of scores `predict` returns for an all-zero input.
    fn output_width(&self, input_shape: [usize; 4]) -> Result<usize, ClassifierError> {
        let [_, height, width, _] = input_shape;
        let blank = NormalizedTensor::zeros(width as u32, height as u32);
        Ok(self.predict(&blank)?.len())
    }
}
