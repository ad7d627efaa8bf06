use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Model has no outputs")]
    NoOutputs,
    #[error("Model returned an empty output tensor")]
    EmptyOutput,
    #[error("Model returned {0}, expected a probability in [0, 1]")]
    InvalidScore(f32),
    #[error("Session mutex poisoned: {0}")]
    Poisoned(String),
}

/// A loaded binary classifier producing a single sigmoid score per image.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, input: &Array<f32, Ix4>) -> Result<f32, InferenceError>;
}

/// Rejects scores a sigmoid cannot produce (NaN, infinities, out of range).
pub fn check_score(score: f32) -> Result<f32, InferenceError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(InferenceError::InvalidScore(score))
    }
}
