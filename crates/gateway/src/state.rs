use crate::pipeline::DetectionPipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DetectionPipeline>,
    pub model_path: Arc<str>,
}

impl AppState {
    pub fn new(pipeline: DetectionPipeline, model_path: &str) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            model_path: Arc::from(model_path),
        }
    }
}
