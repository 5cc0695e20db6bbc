use super::{InferenceBackend, InferenceOutput, labels};
use crate::{config::InferenceConfig, processing::YoloDecoder};
use common::span;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use preprocess::{Letterbox, NormalizedImage};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";

#[derive(Debug, Clone, Copy)]
pub enum ExecutionProvider {
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        #[cfg(feature = "cuda")]
        return ExecutionProvider::Cuda;
        #[cfg(not(feature = "cuda"))]
        return ExecutionProvider::Cpu;
    }
}

/// A session plus the letterbox buffer it feeds from.
struct Slot {
    session: Session,
    letterbox: Letterbox,
}

/// YOLO detector on ONNX Runtime.
///
/// Holds one session per worker so concurrent calls don't serialize on a
/// single `Session::run`.
pub struct OrtBackend {
    slots: Vec<Mutex<Slot>>,
    next_slot: AtomicUsize,
    names: Vec<String>,
    decoder: YoloDecoder,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        config: &InferenceConfig,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let sessions = config.workers.max(1);
        let intra_threads = thread::available_parallelism()
            .map(|n| (n.get() / sessions).max(1))
            .unwrap_or(1);

        let mut slots = Vec::with_capacity(sessions);
        for _ in 0..sessions {
            let session = Self::build_session(&config.model_path, provider, intra_threads)?;
            slots.push(Mutex::new(Slot {
                session,
                letterbox: Letterbox::new(config.input_size),
            }));
        }

        let names = match slots.first() {
            Some(slot) => match slot.lock() {
                Ok(slot) => Self::read_class_names(&slot.session),
                Err(_) => labels::coco_names(),
            },
            None => labels::coco_names(),
        };

        tracing::info!(
            model_path = %config.model_path,
            provider = ?provider,
            sessions,
            intra_threads,
            classes = names.len(),
            "Model loaded"
        );

        Ok(Self {
            slots,
            next_slot: AtomicUsize::new(0),
            names,
            decoder: YoloDecoder::new(config.confidence_threshold, config.iou_threshold),
        })
    }

    fn build_session(
        path: &str,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Session> {
        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        let builder = match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => builder.with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()
                    .error_on_failure(),
            ])?,
            ExecutionProvider::Cpu => builder,
        };

        Ok(builder.commit_from_file(path)?)
    }

    /// Class names from the model's `names` metadata, COCO when absent.
    fn read_class_names(session: &Session) -> Vec<String> {
        let raw = match session.metadata().and_then(|m| Ok(m.custom("names"))) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::info!("Model carries no class names, using COCO labels");
                return labels::coco_names();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read model metadata, using COCO labels");
                return labels::coco_names();
            }
        };

        labels::parse_names(&raw).unwrap_or_else(|| {
            tracing::warn!(names = %raw, "Unparseable class names in model metadata, using COCO labels");
            labels::coco_names()
        })
    }

    /// Run `f` on a free slot, or wait on one in round-robin order.
    fn with_slot<R>(&self, f: impl FnOnce(&mut Slot) -> anyhow::Result<R>) -> anyhow::Result<R> {
        let mut slot = acquire_slot(&self.slots, &self.next_slot);
        f(&mut slot)
    }
}

/// Lock a free slot if there is one, otherwise wait on the next in turn.
///
/// A slot poisoned by a panic mid-inference is reclaimed and its poison flag
/// cleared.
fn acquire_slot<'a, T>(slots: &'a [Mutex<T>], next: &AtomicUsize) -> MutexGuard<'a, T> {
    for (index, slot) in slots.iter().enumerate() {
        match slot.try_lock() {
            Ok(guard) => return guard,
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!(slot = index, "Recovering session slot after panic");
                slot.clear_poison();
                return poisoned.into_inner();
            }
            Err(TryLockError::WouldBlock) => {}
        }
    }

    let index = next.fetch_add(1, Ordering::Relaxed) % slots.len();
    let slot = &slots[index];
    let guard = slot.lock().unwrap_or_else(|poisoned| {
        tracing::warn!(slot = index, "Recovering session slot after panic");
        poisoned.into_inner()
    });
    slot.clear_poison();
    guard
}

impl InferenceBackend for OrtBackend {
    fn load_model(config: &InferenceConfig) -> anyhow::Result<Self> {
        Self::load_model_with_provider(config, ExecutionProvider::default())
    }

    fn class_names(&self) -> &[String] {
        &self.names
    }

    fn infer(&self, image: &NormalizedImage) -> anyhow::Result<InferenceOutput> {
        let records = self.with_slot(|slot| {
            let prepared = slot
                .letterbox
                .apply(image.as_raw(), image.width(), image.height())?;

            let _s = span!("onnx_run");
            let outputs = slot.session.run(ort::inputs![
                INPUT_NAME => TensorRef::from_array_view(prepared.tensor.view())?
            ])?;
            let output = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

            self.decoder.decode(&output, &prepared.transform)
        })?;

        Ok(InferenceOutput { records })
    }
}
