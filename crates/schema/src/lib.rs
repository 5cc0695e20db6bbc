//! Data model shared by the detection pipeline and the HTTP surface.
//!
//! Boxes travel through two coordinate spaces: [`RawDetection`] is in the
//! pixel space of the normalized image handed to the model, [`Detection`]
//! is in the pixel space of the image the client uploaded. Keeping them as
//! distinct types means a box can't be returned without being rescaled.

mod detection;
mod response;

pub use detection::{BoundingBox, Detection, RawDetection};
pub use response::{ErrorKind, ErrorResponse, HealthResponse, ModelInfo, PredictResponse};
