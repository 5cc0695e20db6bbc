use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Image payload is empty")]
    EmptyPayload,

    #[error("Corrupt or unsupported image: {0}")]
    CorruptOrUnsupportedFormat(String),
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Degenerate image dimensions {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    #[error("Maximum dimension must be greater than zero")]
    ZeroBound,

    #[error("Resize failed: {0}")]
    Resize(String),
}
