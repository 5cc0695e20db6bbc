use crate::config::DEFAULT_INPUT_SIZE;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

/// Parameters of a letterbox, used to map model-input coordinates back onto
/// the image that was letterboxed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl LetterboxTransform {
    /// Undo the letterbox for a corner-format box, clamped to the source bounds.
    pub fn to_source(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> [f32; 4] {
        let w = self.source_width as f32;
        let h = self.source_height as f32;
        [
            ((x1 - self.offset_x) / self.scale).clamp(0.0, w),
            ((y1 - self.offset_y) / self.scale).clamp(0.0, h),
            ((x2 - self.offset_x) / self.scale).clamp(0.0, w),
            ((y2 - self.offset_y) / self.scale).clamp(0.0, h),
        ]
    }
}

#[derive(Debug)]
pub struct LetterboxResult {
    /// `[1, 3, H, W]` RGB scaled to `[0, 1]`
    pub tensor: Array<f32, IxDyn>,
    pub transform: LetterboxTransform,
}

/// Fits an RGB image into the detector's fixed input, padding with gray.
pub struct Letterbox {
    pub input_size: (u32, u32),
    letterboxed_buffer: Vec<u8>,
}

impl Letterbox {
    pub fn new(input_size: (u32, u32)) -> Self {
        let buffer_len = input_size.0 as usize * input_size.1 as usize * 3;
        Self {
            input_size,
            letterboxed_buffer: vec![LETTERBOX_COLOR; buffer_len],
        }
    }

    pub fn apply(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<LetterboxResult> {
        let _s = span!("letterbox");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Letterboxing image"
        );

        let expected_size = width as usize * height as usize * 3;
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }

        let (scale, offset_x, offset_y) = self.resize_and_letterbox(pixels, width, height)?;
        let tensor = Self::to_tensor(&self.letterboxed_buffer, self.input_size)?;

        Ok(LetterboxResult {
            tensor,
            transform: LetterboxTransform {
                scale,
                offset_x,
                offset_y,
                source_width: width,
                source_height: height,
            },
        })
    }

    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(f32, f32, f32)> {
        let scale =
            (self.input_size.0 as f32 / width as f32).min(self.input_size.1 as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, self.input_size.0);
        let new_height = ((height as f32 * scale) as u32).clamp(1, self.input_size.1);

        let offset_x = (self.input_size.0 - new_width) / 2;
        let offset_y = (self.input_size.1 - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;

        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = self.input_size.0 as usize * 3;
        let row_bytes = new_width as usize * 3;

        for (y, src) in resized_data.chunks_exact(row_bytes).enumerate() {
            let dst_row = (y + offset_y as usize) * stride + offset_x as usize * 3;
            self.letterboxed_buffer[dst_row..dst_row + row_bytes].copy_from_slice(src);
        }

        Ok((scale, offset_x as f32, offset_y as f32))
    }

    fn to_tensor(buffer: &[u8], input_size: (u32, u32)) -> anyhow::Result<Array<f32, IxDyn>> {
        let width = input_size.0 as usize;
        let height = input_size.1 as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in buffer.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}

impl Default for Letterbox {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_shape_matches_input_size() {
        let pixels = vec![
            255, 0, 0, // Red pixel
            0, 255, 0, // Green pixel
            0, 0, 255, // Blue pixel
            255, 255, 255, // White pixel
        ];

        let mut letterbox = Letterbox::default();
        let result = letterbox.apply(&pixels, 2, 2).unwrap();
        assert_eq!(result.tensor.shape(), &[1, 3, 640, 640]);
    }

    #[test]
    fn test_buffer_size_mismatch_detection() {
        let pixels = vec![0u8; 200]; // Wrong size for 10x10

        let mut letterbox = Letterbox::default();
        let result = letterbox.apply(&pixels, 10, 10);

        assert!(result.is_err(), "Size mismatch should return error");
        assert!(
            result.unwrap_err().to_string().contains("mismatch"),
            "Error should mention mismatch"
        );
    }

    #[test]
    fn test_huge_dimensions_report_mismatch_instead_of_overflowing() {
        let mut letterbox = Letterbox::new((64, 64));
        let err = letterbox.apply(&[], 40_000, 40_000).unwrap_err();
        assert!(err.to_string().contains("mismatch"), "{err}");
        assert!(err.to_string().contains("4800000000"), "{err}");
    }

    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 image (4:3 aspect ratio)
        let pixels = vec![128u8; 800 * 600 * 3];

        let mut letterbox = Letterbox::new((512, 512));
        let result = letterbox.apply(&pixels, 800, 600).unwrap();
        let t = result.transform;

        // Scale should be min(512/800, 512/600) = 512/800 = 0.64
        assert_eq!(t.scale, 0.64, "Scale should preserve aspect ratio");

        // Resized dimensions: 800*0.64 = 512, 600*0.64 = 384
        // Offset Y: (512 - 384) / 2 = 64
        assert_eq!(t.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(t.offset_y, 64.0, "Y offset should center vertically");
        assert_eq!((t.source_width, t.source_height), (800, 600));
    }

    #[test]
    fn test_padding_is_gray_and_pixels_scaled_to_unit_range() {
        let pixels = vec![255u8; 100 * 50 * 3];

        let mut letterbox = Letterbox::new((100, 100));
        let result = letterbox.apply(&pixels, 100, 50).unwrap();

        // Row 0 is padding (offset_y = 25)
        let pad = result.tensor[[0, 0, 0, 50]];
        assert!((pad - 114.0 / 255.0).abs() < 1e-6, "padding was {pad}");

        // Center is image content
        for c in 0..3 {
            let v = result.tensor[[0, c, 50, 50]];
            assert!((v - 1.0).abs() < 1e-6, "channel {c} was {v}");
        }
    }

    #[test]
    fn test_to_source_inverts_letterbox_and_clamps() {
        let t = LetterboxTransform {
            scale: 0.64,
            offset_x: 0.0,
            offset_y: 64.0,
            source_width: 800,
            source_height: 600,
        };

        // 512x512 box (204.8, 204.8, 307.2, 307.2) maps to (320, 220, 480, 380)
        let [x1, y1, x2, y2] = t.to_source(204.8, 204.8, 307.2, 307.2);
        assert!((x1 - 320.0).abs() < 0.1);
        assert!((y1 - 220.0).abs() < 0.1);
        assert!((x2 - 480.0).abs() < 0.1);
        assert!((y2 - 380.0).abs() < 0.1);

        // Padding region maps outside the source and is clamped
        let [x1, y1, x2, y2] = t.to_source(-10.0, 10.0, 600.0, 600.0);
        assert_eq!(x1, 0.0);
        assert_eq!(y1, 0.0);
        assert_eq!(x2, 800.0);
        assert_eq!(y2, 600.0);
    }
}
