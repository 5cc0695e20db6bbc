pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::{Settings, get_configuration};
pub use pipeline::{DetectionPipeline, PipelineError, Upload};
pub use routes::router;
pub use state::AppState;
pub use validation::{ImageValidator, ValidationError};
