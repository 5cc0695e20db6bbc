pub mod backend;
pub mod config;
pub mod errors;
pub mod executor;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput, ModelRecord};
pub use config::InferenceConfig;
pub use errors::InferenceError;
pub use executor::{InferenceExecutor, ModelState};
pub use processing::rescale::rescale;
