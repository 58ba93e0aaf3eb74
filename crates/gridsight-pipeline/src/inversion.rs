//! Background-inversion heuristic.
//!
//! Some dark-theme screenshots render every cell in nearly the same dark
//! shade and mark regions only with bright walls. Such images behave like
//! light-mode puzzles once inverted. The heuristic fires when the corner
//! of the crop is near black and almost all adjacent cells look alike.

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::background::invert;
use crate::color::{cell_colors, color_distance};
use crate::grayscale::luminance;
use crate::types::{GridStructure, PipelineConfig, RgbaImage};

/// Luminance at or below which the corner pixel counts as near black.
pub const NEAR_BLACK_LUMINANCE: u8 = 40;

/// Outcome of the inversion check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InversionCheck {
    /// The top-left pixel is near black.
    pub corner_dark: bool,
    /// Fraction of horizontally or vertically adjacent cell pairs whose
    /// colours are similar.
    pub similar_ratio: f64,
    /// Both conditions hold; the image should be inverted.
    pub invert: bool,
}

/// Fraction of adjacent cell pairs closer than `threshold`.
#[allow(clippy::cast_precision_loss)]
fn similar_pair_ratio(colors: &[Rgb<u8>], n: usize, threshold: f64) -> f64 {
    let mut pairs = 0usize;
    let mut similar = 0usize;
    for row in 0..n {
        for col in 0..n {
            let here = colors[row * n + col];
            let neighbours = [
                (col + 1 < n).then(|| colors[row * n + col + 1]),
                (row + 1 < n).then(|| colors[(row + 1) * n + col]),
            ];
            for other in neighbours.into_iter().flatten() {
                pairs += 1;
                if color_distance(here, other) < threshold {
                    similar += 1;
                }
            }
        }
    }
    if pairs == 0 {
        return 0.0;
    }
    similar as f64 / pairs as f64
}

/// Evaluate the heuristic on the cropped image.
#[must_use]
pub fn check(image: &RgbaImage, grid: &GridStructure, config: &PipelineConfig) -> InversionCheck {
    let corner_dark = image.width() > 0
        && image.height() > 0
        && luminance(image.get_pixel(0, 0)) <= NEAR_BLACK_LUMINANCE;
    let colors = cell_colors(image, grid);
    let similar_ratio = similar_pair_ratio(&colors, grid.grid_size, config.similar_cell_distance);
    let invert = corner_dark && similar_ratio > config.similar_pair_ratio;
    log::debug!(
        "inversion check: corner dark {corner_dark}, similar pairs {:.0}% -> {}",
        similar_ratio * 100.0,
        if invert { "invert" } else { "keep" }
    );
    InversionCheck {
        corner_dark,
        similar_ratio,
        invert,
    }
}

/// Apply the heuristic, returning the (possibly inverted) image.
#[must_use]
pub fn normalize(
    image: RgbaImage,
    grid: &GridStructure,
    config: &PipelineConfig,
) -> (RgbaImage, InversionCheck) {
    let result = check(&image, grid, config);
    if result.invert {
        (invert(&image), result)
    } else {
        (image, result)
    }
}
