//! Gaussian blur helpers.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. The pipeline blurs in
//! three places: the colour enhancer smooths its logic-colour copy, the
//! durability filter re-blurs a matching binarisation by one pixel before
//! building the ownership map, and the durability fallback pass repeats
//! the whole sweep on a one-pixel-blurred copy of the source.
//!
//! [`gaussian_blur`] operates on a single grayscale channel.
//! [`gaussian_blur_rgba`] applies the same blur independently to each
//! R/G/B/A channel of a colour image.

use image::GrayImage;

use crate::types::RgbaImage;

/// Sigma used for the "one pixel" blurs of the durability filter.
pub const ONE_PIXEL_SIGMA: f32 = 1.0;

/// Apply Gaussian blur to a grayscale image.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma values
/// (zero or negative) return the image unchanged, since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Apply Gaussian blur to the colour channels of an RGBA image.
///
/// R, G and B are blurred independently (Gaussian blur is linear and
/// per-channel); alpha is copied through untouched. Non-positive sigma
/// values return the image unchanged.
#[must_use = "returns the blurred RGBA image"]
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let (w, h) = image.dimensions();
    let blurred: [GrayImage; 3] = std::array::from_fn(|c| {
        let channel = GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]));
        imageproc::filter::gaussian_blur_f32(&channel, sigma)
    });

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        for (c, channel) in blurred.iter().enumerate() {
            pixel.0[c] = channel.get_pixel(x, y).0[0];
        }
    }
    out
}
