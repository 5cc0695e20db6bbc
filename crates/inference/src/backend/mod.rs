use crate::config::InferenceConfig;
use preprocess::NormalizedImage;

pub mod labels;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A detection model the executor can drive.
///
/// `infer` takes `&self` and may be called from several blocking workers at
/// once; implementations synchronize whatever runtime state they hold.
pub trait InferenceBackend: Send + Sync + 'static {
    fn load_model(config: &InferenceConfig) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Class names indexed by class id.
    fn class_names(&self) -> &[String];

    /// Run the model on one normalized image. Boxes come back in the
    /// normalized image's pixel space.
    fn infer(&self, image: &NormalizedImage) -> anyhow::Result<InferenceOutput>;
}

/// One entry exactly as the model reported it, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord {
    pub class_id: u32,
    pub confidence: f32,
    /// Corner-format `[x1, y1, x2, y2]`; `None` when the model gave no geometry.
    pub bbox: Option<[f32; 4]>,
}

impl ModelRecord {
    pub fn new(class_id: u32, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_id,
            confidence,
            bbox: Some(bbox),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOutput {
    pub records: Vec<ModelRecord>,
}
