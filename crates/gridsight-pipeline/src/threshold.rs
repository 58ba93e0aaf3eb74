//! Histogram-derived contrast and binarisation.
//!
//! The analysis copy is expected in dark-page layout (the preprocessor
//! inverts light-mode inputs first). Its luminance histogram usually has
//! a dominant peak in the mid-dark range produced by cell interiors; that
//! peak drives a contrast stretch which pushes cells to black and leaves
//! only the bright grid lines white.

use image::{GrayImage, Luma, Rgba};
use serde::{Deserialize, Serialize};

use crate::grayscale::luminance;
use crate::types::RgbaImage;

/// First histogram bin searched for the dominant peak.
pub const PEAK_SEARCH_MIN: usize = 15;
/// Last histogram bin searched for the dominant peak.
pub const PEAK_SEARCH_MAX: usize = 149;
/// Contrast multiplier applied to every channel.
pub const CONTRAST_GAIN: i32 = 2;
/// Fixed darkening applied on top of the peak-derived offset.
pub const BRIGHTNESS_BIAS: i32 = 200;
/// Distance above the peak at which a contrasted pixel counts as light.
pub const THRESHOLD_MARGIN: i32 = 45;

/// 256-bin luminance histogram.
#[must_use]
pub fn luminance_histogram(image: &RgbaImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[usize::from(luminance(pixel))] += 1;
    }
    histogram
}

/// Contrast and cut-off parameters derived from one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    /// Dominant luminance bin within the search window.
    pub line_luminance: u8,
    /// Offset added after the contrast gain (`-line_luminance - 200`).
    pub brightness_offset: i32,
    /// Luminance at or above which a contrasted pixel is light.
    pub threshold: u8,
}

impl AdaptiveThreshold {
    /// Derive the parameters from `image`'s luminance histogram.
    ///
    /// Ties between equally populated bins resolve to the darkest one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn derive(image: &RgbaImage) -> Self {
        let histogram = luminance_histogram(image);
        let mut peak = PEAK_SEARCH_MIN;
        for bin in PEAK_SEARCH_MIN..=PEAK_SEARCH_MAX {
            if histogram[bin] > histogram[peak] {
                peak = bin;
            }
        }
        let line_luminance = peak as u8;
        let threshold = (i32::from(line_luminance) + THRESHOLD_MARGIN).clamp(0, 255) as u8;
        log::debug!("histogram peak {line_luminance}, binarisation cut {threshold}");
        Self {
            line_luminance,
            brightness_offset: -i32::from(line_luminance) - BRIGHTNESS_BIAS,
            threshold,
        }
    }

    /// Apply the contrast stretch to one channel value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn stretch(&self, value: u8) -> u8 {
        (CONTRAST_GAIN * i32::from(value) + self.brightness_offset).clamp(0, 255) as u8
    }

    /// Whether a pixel is dark after the contrast stretch.
    #[must_use]
    pub fn is_dark(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, a] = pixel.0;
        let stretched = Rgba([self.stretch(r), self.stretch(g), self.stretch(b), a]);
        luminance(&stretched) < self.threshold
    }

    /// Binarise `image`: dark pixels become 0, light pixels 255.
    #[must_use = "returns the binary image"]
    pub fn binarize(&self, image: &RgbaImage) -> GrayImage {
        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if self.is_dark(image.get_pixel(x, y)) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }
}
