use crate::{DecodeError, RawImage};
use common::span;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Decode an uploaded payload into pixels.
///
/// Two passes over the same bytes: the first reads only the container header
/// to confirm the format and frame geometry, the second materializes the
/// pixels. A frame whose decoded size disagrees with its header is rejected.
pub fn decode(bytes: &[u8]) -> Result<RawImage, DecodeError> {
    let _s = span!("decode_image");

    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let format = image::guess_format(bytes).map_err(corrupt)?;

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(corrupt)?;

    tracing::trace!(
        format = ?format,
        width,
        height,
        payload_bytes = bytes.len(),
        "Image header verified"
    );

    let pixels = ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(corrupt)?;

    if pixels.width() != width || pixels.height() != height {
        return Err(DecodeError::CorruptOrUnsupportedFormat(format!(
            "decoded frame is {}x{} but header declares {}x{}",
            pixels.width(),
            pixels.height(),
            width,
            height
        )));
    }

    Ok(RawImage::new(pixels, Some(format)))
}

/// Lowercase extensions of every container `decode` understands.
pub fn supported_formats() -> Vec<&'static str> {
    [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
        ImageFormat::WebP,
    ]
    .iter()
    .flat_map(|f| f.extensions_str().iter().copied())
    .collect()
}

fn corrupt(err: image::ImageError) -> DecodeError {
    DecodeError::CorruptOrUnsupportedFormat(err.to_string())
}
