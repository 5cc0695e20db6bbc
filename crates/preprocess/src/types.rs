use image::{ColorType, DynamicImage, ImageFormat, RgbImage};

/// A decoded upload, exactly as the client sent it.
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: DynamicImage,
    format: Option<ImageFormat>,
}

impl RawImage {
    pub fn new(pixels: DynamicImage, format: Option<ImageFormat>) -> Self {
        Self { pixels, format }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Channel layout and bit depth of the decoded buffer.
    pub fn channel_mode(&self) -> ColorType {
        self.pixels.color()
    }

    /// Container format the bytes were decoded from, if known.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.pixels
    }
}

impl From<NormalizedImage> for RawImage {
    fn from(image: NormalizedImage) -> Self {
        Self::new(DynamicImage::ImageRgb8(image.into_rgb()), None)
    }
}

/// 8-bit RGB image in the geometry the detector consumes.
///
/// Owns its buffer, so the [`RawImage`] it came from can be dropped or kept
/// independently.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pixels: RgbImage,
}

impl NormalizedImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Packed RGB bytes in HWC order.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_rgb(self) -> RgbImage {
        self.pixels
    }
}
