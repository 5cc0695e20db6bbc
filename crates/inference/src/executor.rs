use crate::{
    backend::InferenceBackend, config::InferenceConfig, errors::InferenceError,
    processing::PostProcessor,
};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use preprocess::NormalizedImage;
use schema::RawDetection;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Semaphore;

/// Lifecycle of the model inside an executor. Transitions only move forward:
/// `Unloaded -> Loading -> Ready | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelState {
    Unloaded = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl ModelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ModelState::Unloaded,
            1 => ModelState::Loading,
            2 => ModelState::Ready,
            _ => ModelState::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Failed => "failed",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ExecutorMetrics {
    duration: Histogram<f64>,
    detections: Counter<u64>,
    skipped: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> ExecutorMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
    ];
    ExecutorMetrics {
        duration: meter
            .f64_histogram("inference_duration_seconds")
            .with_description("Time spent in the model for a single image")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        detections: meter
            .u64_counter("inference_detections_total")
            .with_description("Total detections returned above the confidence threshold")
            .build(),
        skipped: meter
            .u64_counter("inference_detections_skipped_total")
            .with_description("Total model records dropped as malformed")
            .build(),
    }
}

/// Owns the loaded model and runs it off the async runtime.
///
/// At most `workers` inferences run at once, each on the blocking pool.
/// Callers past that limit wait for a permit instead of failing.
pub struct InferenceExecutor {
    state: AtomicU8,
    model: OnceLock<Arc<dyn InferenceBackend>>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    postprocessor: PostProcessor,
    metrics: ExecutorMetrics,
}

impl InferenceExecutor {
    pub fn new(config: &InferenceConfig) -> Self {
        let worker_count = config.workers.max(1);
        Self {
            state: AtomicU8::new(ModelState::Unloaded as u8),
            model: OnceLock::new(),
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            postprocessor: PostProcessor::new(config.confidence_threshold),
            metrics: init_metrics("inference"),
        }
    }

    pub fn state(&self) -> ModelState {
        ModelState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.postprocessor.confidence_threshold
    }

    /// Load the model once. `loader` runs on the blocking pool.
    ///
    /// Only the first call does anything; later calls get
    /// `LoadAlreadyAttempted` whatever the outcome of the first.
    pub async fn load<B, F>(&self, loader: F) -> Result<(), InferenceError>
    where
        B: InferenceBackend,
        F: FnOnce() -> anyhow::Result<B> + Send + 'static,
    {
        if let Err(current) = self.state.compare_exchange(
            ModelState::Unloaded as u8,
            ModelState::Loading as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(InferenceError::LoadAlreadyAttempted(ModelState::from_u8(
                current,
            )));
        }

        tracing::info!("Loading model");
        let start = Instant::now();

        let loaded = match tokio::task::spawn_blocking(loader).await {
            Ok(Ok(backend)) => Ok(backend),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(e) => Err(format!("loader task failed: {e}")),
        };

        match loaded {
            Ok(backend) => {
                let classes = backend.class_names().len();
                let _ = self.model.set(Arc::new(backend));
                self.state
                    .store(ModelState::Ready as u8, Ordering::Release);
                tracing::info!(
                    classes,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model ready"
                );
                Ok(())
            }
            Err(message) => {
                self.state
                    .store(ModelState::Failed as u8, Ordering::Release);
                tracing::error!(error = %message, "Model failed to load");
                Err(InferenceError::LoadFailed(message))
            }
        }
    }

    /// Detect objects in one normalized image.
    ///
    /// Returns detections at or above the confidence threshold in
    /// normalized-image pixel space, in model order. If the caller is dropped
    /// mid-flight the blocking work still runs to completion and its result
    /// is discarded.
    pub async fn predict(
        &self,
        image: NormalizedImage,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let backend = self
            .ready_backend()
            .ok_or_else(|| InferenceError::ModelNotReady(self.state()))?;

        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| InferenceError::Runtime("inference worker pool is closed".to_string()))?;

        let span = tracing::info_span!(
            "model_inference",
            width = image.width(),
            height = image.height()
        );
        let worker = Arc::clone(&backend);
        let start = Instant::now();

        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _enter = span.enter();
            worker.infer(&image)
        })
        .await
        .map_err(|e| InferenceError::Runtime(format!("inference worker failed: {e}")))?
        .map_err(|e| InferenceError::Runtime(format!("{e:#}")))?;

        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &[]);

        let parsed = self
            .postprocessor
            .parse_detections(output, backend.class_names());

        if parsed.skipped > 0 {
            self.metrics.skipped.add(parsed.skipped as u64, &[]);
        }
        self.metrics
            .detections
            .add(parsed.detections.len() as u64, &[]);

        tracing::debug!(
            detections = parsed.detections.len(),
            skipped = parsed.skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Inference complete"
        );

        Ok(parsed.detections)
    }

    fn ready_backend(&self) -> Option<Arc<dyn InferenceBackend>> {
        if !self.is_ready() {
            return None;
        }
        self.model.get().cloned()
    }
}
