use crate::{
    pipeline::{PipelineError, Upload},
    state::AppState,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    routing::{get, post},
};
use schema::{HealthResponse, ModelInfo, PredictResponse};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

/// Headroom above the upload limit for multipart framing, so an oversized
/// file reaches the validator instead of being cut off by the transport.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .pipeline
        .validator()
        .max_upload_bytes()
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .route("/model/info", get(model_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Object detection service is running".to_string(),
    })
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    let executor = state.pipeline.executor();
    Json(ModelInfo {
        model_path: state.model_path.to_string(),
        confidence_threshold: executor.confidence_threshold(),
        model_loaded: executor.is_ready(),
    })
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PipelineError> {
    let multipart = multipart.map_err(|e| PipelineError::MalformedUpload(e.body_text()))?;
    let upload = read_upload(multipart).await?;
    let response = state.pipeline.run(upload).await?;
    Ok(Json(response))
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, PipelineError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::MalformedUpload(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PipelineError::MalformedUpload(e.body_text()))?;

        return Ok(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(PipelineError::MalformedUpload(format!(
        "missing multipart field `{UPLOAD_FIELD}`"
    )))
}
