use crate::validation::{ImageValidator, ValidationError};
use inference::{InferenceError, InferenceExecutor, rescale};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use preprocess::{DecodeError, NormalizeError, Normalizer};
use schema::PredictResponse;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// One uploaded file as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to decode image: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to normalize image: {0}")]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("Image worker failed: {0}")]
    Worker(String),
}

struct PipelineMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
}

fn init_metrics(meter_name: &'static str) -> PipelineMetrics {
    let meter = global::meter(meter_name);
    PipelineMetrics {
        requests: meter
            .u64_counter("gateway_requests_total")
            .with_description("Prediction requests by outcome")
            .build(),
        duration: meter
            .f64_histogram("gateway_request_duration_seconds")
            .with_description("Time from upload received to response built")
            .with_unit("s")
            .build(),
    }
}

/// Runs one upload through validate, decode, normalize, infer and rescale.
pub struct DetectionPipeline {
    validator: ImageValidator,
    normalizer: Normalizer,
    executor: Arc<InferenceExecutor>,
    metrics: PipelineMetrics,
}

impl DetectionPipeline {
    pub fn new(
        validator: ImageValidator,
        normalizer: Normalizer,
        executor: Arc<InferenceExecutor>,
    ) -> Self {
        Self {
            validator,
            normalizer,
            executor,
            metrics: init_metrics("gateway"),
        }
    }

    pub fn executor(&self) -> &Arc<InferenceExecutor> {
        &self.executor
    }

    pub fn validator(&self) -> &ImageValidator {
        &self.validator
    }

    #[tracing::instrument(
        name = "predict",
        skip_all,
        fields(filename = upload.filename.as_deref().unwrap_or(""), bytes = upload.bytes.len())
    )]
    pub async fn run(&self, upload: Upload) -> Result<PredictResponse, PipelineError> {
        let start = Instant::now();
        let result = self.process(upload).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        self.metrics
            .requests
            .add(1, &[KeyValue::new("outcome", outcome)]);
        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &[]);

        if let Ok(response) = &result {
            tracing::info!(
                total_objects = response.total_objects,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Prediction served"
            );
        }

        result
    }

    async fn process(&self, upload: Upload) -> Result<PredictResponse, PipelineError> {
        self.validator.validate(
            upload.filename.as_deref(),
            upload.content_type.as_deref(),
            upload.bytes.len(),
        )?;
        let filename = upload.filename.unwrap_or_default();

        let normalizer = self.normalizer;
        let bytes = upload.bytes;
        let (image, factors) = tokio::task::spawn_blocking(move || {
            let raw = preprocess::decode(&bytes)?;
            Ok::<_, PipelineError>(normalizer.normalize(raw)?)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;

        let detections = self.executor.predict(image).await?;
        let predictions = rescale(detections, &factors);

        Ok(PredictResponse::new(filename, predictions))
    }
}
