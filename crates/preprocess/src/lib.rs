pub mod codec;
pub mod config;
pub mod error;
pub mod letterbox;
pub mod normalize;
pub mod types;

pub use codec::decode;
pub use config::{DEFAULT_INPUT_SIZE, DEFAULT_MAX_DIMENSION};
pub use error::{DecodeError, NormalizeError};
pub use letterbox::{Letterbox, LetterboxResult, LetterboxTransform};
pub use normalize::{Normalizer, ScaleFactors, bounded_dimensions};
pub use types::{NormalizedImage, RawImage};
