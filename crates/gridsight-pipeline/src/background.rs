//! Background-mode detection and channel inversion.
//!
//! A puzzle photographed on paper or shown in a light theme has a bright
//! page and dark lines; a dark-theme screenshot has the opposite. Shape
//! analysis assumes the dark-page layout, so light-mode inputs are
//! channel-inverted first.

use crate::grayscale::mean_luminance;
use crate::types::{BackgroundMode, RgbaImage};

/// Mean luminance above which an image is considered light mode.
pub const LIGHT_MODE_MEAN: f64 = 128.0;

/// Classify the background of `image` by its mean luminance.
#[must_use]
pub fn detect_mode(image: &RgbaImage) -> BackgroundMode {
    let mean = mean_luminance(image);
    let mode = if mean > LIGHT_MODE_MEAN {
        BackgroundMode::Light
    } else {
        BackgroundMode::Dark
    };
    log::debug!("mean luminance {mean:.1} -> {mode} background");
    mode
}

/// Invert the colour channels of `image`, leaving alpha untouched.
#[must_use = "returns the inverted image"]
pub fn invert(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        pixel.0 = [!r, !g, !b, a];
    }
    out
}
