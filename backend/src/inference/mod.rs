pub mod classifier;
pub mod decision;
pub mod model;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

pub use classifier::{Classifier, ClassifierError};
pub use model::{ClassifyError, Model, PredictionResult, StartupError};
pub use preprocess::{NormalizedTensor, Preprocessor};
