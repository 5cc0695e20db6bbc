use crate::pipeline::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::InferenceError;
use preprocess::{DecodeError, NormalizeError};
use schema::{ErrorKind, ErrorResponse};

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MalformedUpload(_) | PipelineError::Validation(_) => {
                ErrorKind::InvalidInput
            }
            PipelineError::Decode(DecodeError::EmptyPayload) => ErrorKind::InvalidInput,
            PipelineError::Decode(DecodeError::CorruptOrUnsupportedFormat(_)) => {
                ErrorKind::UnprocessableImage
            }
            PipelineError::Normalize(NormalizeError::ZeroBound) => {
                ErrorKind::InferenceRuntimeError
            }
            PipelineError::Normalize(_) => ErrorKind::UnprocessableImage,
            PipelineError::Inference(InferenceError::ModelNotReady(_)) => {
                ErrorKind::ModelNotReady
            }
            PipelineError::Inference(_) | PipelineError::Worker(_) => {
                ErrorKind::InferenceRuntimeError
            }
        }
    }

    /// Message shown to the client. Unprocessable images get a hint naming
    /// the formats the decoder understands.
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::UnprocessableImage => format!(
                "{self}. Please ensure the file is a valid image ({})",
                accepted_formats()
            ),
            ErrorKind::ModelNotReady => format!("{self}. Retry shortly"),
            _ => self.to_string(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::UnprocessableImage => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::InferenceRuntimeError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn accepted_formats() -> String {
    preprocess::codec::supported_formats()
        .iter()
        .map(|ext| ext.to_uppercase())
        .collect::<Vec<_>>()
        .join(", ")
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        if kind.is_client_error() {
            tracing::warn!(error_kind = kind.as_str(), error = %self, "Request rejected");
        } else {
            tracing::error!(error_kind = kind.as_str(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error_kind: kind,
            message: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}
