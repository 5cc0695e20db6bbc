use crate::executor::ModelState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model is not ready (state: {0})")]
    ModelNotReady(ModelState),

    #[error("Model load was already attempted (state: {0})")]
    LoadAlreadyAttempted(ModelState),

    #[error("Model failed to load: {0}")]
    LoadFailed(String),

    #[error("Inference runtime error: {0}")]
    Runtime(String),
}
