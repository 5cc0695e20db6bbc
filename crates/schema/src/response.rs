use crate::Detection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub filename: String,
    pub predictions: Vec<Detection>,
    pub total_objects: usize,
}

impl PredictResponse {
    pub fn new(filename: String, predictions: Vec<Detection>) -> Self {
        Self {
            filename,
            total_objects: predictions.len(),
            predictions,
        }
    }
}

/// Failure classes visible to clients, ordered from client-caused to server-caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnprocessableImage,
    ModelNotReady,
    InferenceRuntimeError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnprocessableImage => "unprocessable_image",
            ErrorKind::ModelNotReady => "model_not_ready",
            ErrorKind::InferenceRuntimeError => "inference_runtime_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::InvalidInput | ErrorKind::UnprocessableImage)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub model_loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_objects_tracks_prediction_count() {
        let response = PredictResponse::new("cat.png".to_string(), Vec::new());
        assert_eq!(response.total_objects, 0);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["filename"], "cat.png");
        assert_eq!(json["total_objects"], 0);
        assert!(json["predictions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_kind_serializes_as_snake_case() {
        for kind in [
            ErrorKind::InvalidInput,
            ErrorKind::UnprocessableImage,
            ErrorKind::ModelNotReady,
            ErrorKind::InferenceRuntimeError,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn only_input_problems_are_client_errors() {
        assert!(ErrorKind::InvalidInput.is_client_error());
        assert!(ErrorKind::UnprocessableImage.is_client_error());
        assert!(!ErrorKind::ModelNotReady.is_client_error());
        assert!(!ErrorKind::InferenceRuntimeError.is_client_error());
    }
}
