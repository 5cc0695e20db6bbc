pub mod post;
pub mod rescale;
pub mod yolo;

pub use post::{ParsedDetections, PostProcessor};
pub use yolo::YoloDecoder;
