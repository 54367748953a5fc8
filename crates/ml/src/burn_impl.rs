use burn::tensor::{activation, Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};

use crate::ScorerError;

type Backend = NdArray<f32>;

/// Softmax over a rank-1 tensor on the NdArray backend.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, ScorerError> {
    if logits.is_empty() {
        return Err(ScorerError::Inference(
            "softmax over an empty logit vector".to_string(),
        ));
    }

    let device = NdArrayDevice::default();
    let data = TensorData::new(logits.to_vec(), [logits.len()]);
    let tensor = Tensor::<Backend, 1>::from_data(data, &device);

    activation::softmax(tensor, 0)
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| ScorerError::Inference(format!("burn tensor readback failed: {err:?}")))
}
