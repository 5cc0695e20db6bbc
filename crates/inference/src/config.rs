use preprocess::DEFAULT_INPUT_SIZE;
use std::num::NonZeroUsize;
use std::thread;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model_path: String,
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Inference calls allowed to run at the same time.
    pub workers: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            workers: default_workers(),
        }
    }
}

/// Hardware parallelism, or 1 when it can't be queried.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
