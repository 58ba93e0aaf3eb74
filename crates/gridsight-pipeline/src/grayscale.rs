//! Image decoding and luminance helpers.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGBA
//! buffer every later stage clones from. Luminance uses the Rec. 601
//! weights `0.299*R + 0.587*G + 0.114*B` throughout the pipeline so that
//! every threshold refers to the same scale.

use image::{GrayImage, Rgba};

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes into an RGBA buffer.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Luminance of one pixel on the 0..=255 scale. Alpha is ignored.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luminance(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    let l = 0.114f32.mul_add(
        f32::from(b),
        0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
    );
    l.round().clamp(0.0, 255.0) as u8
}

/// Luminance image of an RGBA buffer.
#[must_use = "returns the luminance image"]
pub fn luminance_image(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([luminance(image.get_pixel(x, y))])
    })
}

/// Mean luminance over the whole image (0.0 for an empty image).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_luminance(image: &RgbaImage) -> f64 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image.pixels().map(|p| u64::from(luminance(p))).sum();
    sum as f64 / count as f64
}
