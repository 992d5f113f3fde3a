use std::path::Path;
use std::sync::Mutex;

use tch::{CModule, Device, Kind, Tensor};

use super::classifier::{Classifier, ClassifierError};
use super::preprocess::NormalizedTensor;

/// TorchScript export of the flower classifier, run through libtorch.
pub struct TorchClassifier {
    // CModule is Send but not Sync; every forward pass takes the lock.
    module: Mutex<CModule>,
    device: Device,
    apply_softmax: bool,
}

impl TorchClassifier {
    pub fn load(path: &Path, apply_softmax: bool) -> Result<Self, ClassifierError> {
        let device = Device::cuda_if_available();
        log::info!("Loading TorchScript model from {} on {:?}", path.display(), device);
        let mut module =
            CModule::load_on_device(path, device).map_err(|e| ClassifierError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        module.set_eval();
        Ok(Self {
            module: Mutex::new(module),
            device,
            apply_softmax,
        })
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        let shape = input.shape();
        let dims = shape.map(|d| d as i64);
        let forward_error = |e: tch::TchError| ClassifierError::Forward {
            shape,
            reason: e.to_string(),
        };

        let tensor = Tensor::from_slice(input.as_slice())
            .f_view(dims)
            .and_then(|t| t.f_to_device(self.device))
            .map_err(forward_error)?;

        let output = {
            let module = self.module.lock().map_err(|_| ClassifierError::Poisoned)?;
            tch::no_grad(|| module.forward_ts(&[tensor])).map_err(forward_error)?
        };

        flatten_scores(&output, self.apply_softmax)
    }
}

/// Copies the model output to the host as one flat score vector. Outputs may
/// be non-contiguous, so this reshapes rather than views.
fn flatten_scores(output: &Tensor, apply_softmax: bool) -> Result<Vec<f32>, ClassifierError> {
    let output_error = |e: tch::TchError| ClassifierError::Output(e.to_string());
    let scores = if apply_softmax {
        output.f_softmax(-1, Kind::Float)
    } else {
        output.f_to_kind(Kind::Float)
    }
    .map_err(output_error)?;
    let flat = scores
        .f_to_device(Device::Cpu)
        .and_then(|t| t.f_reshape([-1]))
        .map_err(output_error)?;
    Vec::<f32>::try_from(&flat).map_err(output_error)
}
