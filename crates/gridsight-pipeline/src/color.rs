//! Per-cell colour sampling.
//!
//! Region identity in coloured puzzles is carried by cell fill colour.
//! Two colours are sampled per cell: the display colour straight from the
//! image, and a logic colour from a copy whose saturation is boosted and
//! lightness flattened, so that a faint pastel and its shadowed neighbour
//! compare equal while different hues stay far apart.

use image::{Rgb, Rgba};
use palette::{FromColor, Hsl, Srgb};
use serde::{Deserialize, Serialize};

use crate::blur::gaussian_blur_rgba;
use crate::types::{CellRect, GridStructure, RgbaImage};

/// Saturation multiplier of the logic copy.
pub const SATURATION_BOOST: f32 = 2.0;

/// Lightness every logic-copy pixel is set to.
pub const NORMALIZED_LIGHTNESS: f32 = 0.5;

/// Blur applied to the logic copy before sampling.
pub const LOGIC_BLUR_SIGMA: f32 = 2.0;

/// Fraction trimmed from every side of a cell before sampling, keeping
/// grid lines out of the colour estimate.
pub const SAMPLE_INSET: f64 = 0.2;

/// Bits kept per channel when bucketing colours.
const BUCKET_BITS: u32 = 3;

/// Euclidean RGB distance.
#[must_use]
pub fn color_distance(a: Rgb<u8>, b: Rgb<u8>) -> f64 {
    let sq: i32 = (0..3)
        .map(|c| {
            let d = i32::from(a.0[c]) - i32::from(b.0[c]);
            d * d
        })
        .sum();
    f64::from(sq).sqrt()
}

/// Most common colour inside `rect`.
///
/// Pixels are bucketed by the top bits of each channel; the result is the
/// mean colour of the most populated bucket (ties go to the lowest
/// bucket). Returns black for an empty rectangle.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn dominant_color(image: &RgbaImage, rect: CellRect) -> Rgb<u8> {
    let buckets = 1usize << (3 * BUCKET_BITS);
    let mut counts = vec![0u64; buckets];
    let mut sums = vec![[0u64; 3]; buckets];

    let x_end = (rect.x + rect.width).min(image.width());
    let y_end = (rect.y + rect.height).min(image.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            let shift = 8 - BUCKET_BITS;
            let idx = (usize::from(r >> shift) << (2 * BUCKET_BITS))
                | (usize::from(g >> shift) << BUCKET_BITS)
                | usize::from(b >> shift);
            counts[idx] += 1;
            sums[idx][0] += u64::from(r);
            sums[idx][1] += u64::from(g);
            sums[idx][2] += u64::from(b);
        }
    }

    let mut best = 0;
    for idx in 1..buckets {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    let n = counts[best];
    if n == 0 {
        return Rgb([0, 0, 0]);
    }
    let mean = |c: usize| ((sums[best][c] + n / 2) / n) as u8;
    Rgb([mean(0), mean(1), mean(2)])
}

/// Boost saturation and flatten lightness of one pixel.
#[must_use]
pub fn normalize_color(pixel: Rgba<u8>) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let srgb = Srgb::new(r, g, b).into_format::<f32>();
    let mut hsl: Hsl = Hsl::from_color(srgb);
    hsl.saturation = (hsl.saturation * SATURATION_BOOST).min(1.0);
    hsl.lightness = NORMALIZED_LIGHTNESS;
    let rgb: Srgb<f32> = Srgb::from_color(hsl);
    let out: Srgb<u8> = rgb.into_format();
    Rgba([out.red, out.green, out.blue, a])
}

/// The saturation-boosted, lightness-normalised, blurred copy.
#[must_use = "returns the logic image"]
pub fn logic_image(image: &RgbaImage) -> RgbaImage {
    let mut normalized = image.clone();
    for pixel in normalized.pixels_mut() {
        *pixel = normalize_color(*pixel);
    }
    gaussian_blur_rgba(&normalized, LOGIC_BLUR_SIGMA)
}

/// Colours sampled from one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellColors {
    /// Colour used for region comparisons.
    pub logic: [u8; 3],
    /// Colour as it appears in the image.
    pub display: [u8; 3],
}

/// Sample the dominant colour of every cell, row-major.
#[must_use]
pub fn cell_colors(image: &RgbaImage, grid: &GridStructure) -> Vec<Rgb<u8>> {
    let n = grid.grid_size;
    let mut colors = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let rect = grid.cell_rect(row, col).inset(SAMPLE_INSET);
            colors.push(dominant_color(image, rect));
        }
    }
    colors
}

/// Sample logic and display colours for every cell, row-major.
#[must_use]
pub fn sample_cells(image: &RgbaImage, grid: &GridStructure) -> Vec<CellColors> {
    let logic = cell_colors(&logic_image(image), grid);
    let display = cell_colors(image, grid);
    logic
        .into_iter()
        .zip(display)
        .map(|(l, d)| CellColors {
            logic: l.0,
            display: d.0,
        })
        .collect()
}
