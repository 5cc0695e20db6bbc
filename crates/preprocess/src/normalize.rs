use crate::{NormalizeError, NormalizedImage, RawImage};
use common::{span, span_debug};
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::{DynamicImage, RgbImage};

/// Multipliers mapping a coordinate in normalized-image space forward to
/// original-image space: `original / normalized` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub scale_x: f32,
    pub scale_y: f32,
}

impl ScaleFactors {
    pub const IDENTITY: ScaleFactors = ScaleFactors {
        scale_x: 1.0,
        scale_y: 1.0,
    };

    pub fn between(original: (u32, u32), normalized: (u32, u32)) -> Self {
        Self {
            scale_x: original.0 as f32 / normalized.0 as f32,
            scale_y: original.1 as f32 / normalized.1 as f32,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Coerces images to 8-bit RGB and shrinks them so neither side exceeds
/// `max_dimension`, keeping the aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_dimension: u32,
}

impl Normalizer {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn normalize(
        &self,
        image: RawImage,
    ) -> Result<(NormalizedImage, ScaleFactors), NormalizeError> {
        let _s = span!("normalize_image");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(NormalizeError::DegenerateImage { width, height });
        }
        if self.max_dimension == 0 {
            return Err(NormalizeError::ZeroBound);
        }

        let source_mode = image.channel_mode();
        let rgb = coerce_rgb(image.into_dynamic());

        let (new_width, new_height) = bounded_dimensions(width, height, self.max_dimension);
        let rgb = if (new_width, new_height) == (width, height) {
            rgb
        } else {
            resize(&rgb, new_width, new_height)?
        };

        let factors = ScaleFactors::between((width, height), (new_width, new_height));

        tracing::debug!(
            source_mode = ?source_mode,
            width,
            height,
            new_width,
            new_height,
            scale_x = factors.scale_x,
            scale_y = factors.scale_y,
            "Image normalized"
        );

        Ok((NormalizedImage::from_rgb(rgb), factors))
    }
}

/// Target size for a `width x height` image under `max_dimension`.
///
/// Images already within bounds are returned unchanged. Otherwise the longer
/// side becomes exactly `max_dimension` and the shorter one is scaled by the
/// same factor and rounded, never below one pixel.
pub fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let longer = width.max(height) as f64;
    let scale = max_dimension as f64 / longer;
    let shrink = |side: u32| -> u32 {
        ((side as f64 * scale).round() as u32).clamp(1, max_dimension)
    };

    if width >= height {
        (max_dimension, shrink(height))
    } else {
        (shrink(width), max_dimension)
    }
}

fn coerce_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

fn resize(src: &RgbImage, width: u32, height: u32) -> Result<RgbImage, NormalizeError> {
    let _s = span_debug!("resize_lanczos");

    let src_ref = ImageRef::new(src.width(), src.height(), src.as_raw(), PixelType::U8x3)
        .map_err(|e| NormalizeError::Resize(e.to_string()))?;

    let mut resized = Image::new(width, height, PixelType::U8x3);

    Resizer::new()
        .resize(
            &src_ref,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3)),
        )
        .map_err(|e| NormalizeError::Resize(e.to_string()))?;

    RgbImage::from_raw(width, height, resized.buffer().to_vec()).ok_or_else(|| {
        NormalizeError::Resize(format!("resized buffer does not hold {width}x{height} RGB"))
    })
}
