//! Crop planning around the main shape.
//!
//! Each side of the main shape's bounding box is examined on its own: a
//! side is cropped (with padding) only when a wide band of nothing
//! separates the puzzle from the nearest large secondary shape, or from
//! the image edge when there is none. Narrow gaps are left alone so that
//! a puzzle frame detached from its cells is not cut away.

use serde::{Deserialize, Serialize};

use crate::shapes::ShapeMap;
use crate::types::{Dimensions, PipelineConfig, PipelineError};

/// Pixel rectangle to cut from an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CropRect {
    /// Map a rectangle found on a downsampled copy onto the source image,
    /// clamped to `full`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scaled(self, scale: f64, full: Dimensions) -> Self {
        let map = |v: u32, limit: u32| ((f64::from(v) * scale).round().max(0.0) as u32).min(limit);
        let x = map(self.x, full.width.saturating_sub(1));
        let y = map(self.y, full.height.saturating_sub(1));
        let right = map(self.x + self.width, full.width).max(x + 1);
        let bottom = map(self.y + self.height, full.height).max(y + 1);
        Self {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// Nearest qualifying secondary pixel beyond each side of the main box,
/// looking only within the band the box spans on the other axis.
#[derive(Debug, Default)]
struct Neighbours {
    left: Option<u32>,
    right: Option<u32>,
    top: Option<u32>,
    bottom: Option<u32>,
}

/// Decide the crop rectangle for `shapes` on an image of size `dims`.
///
/// # Errors
///
/// Returns [`PipelineError::NonSquareShape`] if the main shape deviates
/// from square by more than `config.max_aspect_deviation`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn plan_crop(
    shapes: &ShapeMap,
    dims: Dimensions,
    config: &PipelineConfig,
) -> Result<CropRect, PipelineError> {
    let main = shapes.main.bbox;
    let aspect = main.aspect();
    if aspect - 1.0 > config.max_aspect_deviation {
        return Err(PipelineError::NonSquareShape { aspect });
    }

    let width = f64::from(dims.width);
    let large = width * config.large_section_fraction;
    let nothingness = width * config.big_nothingness_fraction;
    let pad = (width * config.crop_padding_fraction).round() as u32;

    let qualifying: Vec<u32> = shapes
        .secondary
        .iter()
        .filter(|s| f64::from(s.bbox.width().max(s.bbox.height())) >= large)
        .map(|s| s.label)
        .collect();

    let mut near = Neighbours::default();
    if !qualifying.is_empty() {
        for (x, y, pixel) in shapes.labels.enumerate_pixels() {
            let label = pixel.0[0];
            if label == 0 || !qualifying.contains(&label) {
                continue;
            }
            let beside = (main.min_y..=main.max_y).contains(&y);
            let above_or_below = (main.min_x..=main.max_x).contains(&x);
            if beside && x < main.min_x {
                near.left = Some(near.left.map_or(x, |n| n.max(x)));
            }
            if beside && x > main.max_x {
                near.right = Some(near.right.map_or(x, |n| n.min(x)));
            }
            if above_or_below && y < main.min_y {
                near.top = Some(near.top.map_or(y, |n| n.max(y)));
            }
            if above_or_below && y > main.max_y {
                near.bottom = Some(near.bottom.map_or(y, |n| n.min(y)));
            }
        }
    }

    let last_x = dims.width.saturating_sub(1);
    let last_y = dims.height.saturating_sub(1);

    let gap_left = near.left.map_or(main.min_x, |n| main.min_x - n - 1);
    let gap_right = near.right.map_or(last_x - main.max_x, |n| n - main.max_x - 1);
    let gap_top = near.top.map_or(main.min_y, |n| main.min_y - n - 1);
    let gap_bottom = near.bottom.map_or(last_y - main.max_y, |n| n - main.max_y - 1);

    let cut = |gap: u32| f64::from(gap) > nothingness;
    let left = if cut(gap_left) { main.min_x.saturating_sub(pad) } else { 0 };
    let right = if cut(gap_right) { (main.max_x + pad).min(last_x) } else { last_x };
    let top = if cut(gap_top) { main.min_y.saturating_sub(pad) } else { 0 };
    let bottom = if cut(gap_bottom) { (main.max_y + pad).min(last_y) } else { last_y };

    log::debug!(
        "crop gaps l={gap_left} r={gap_right} t={gap_top} b={gap_bottom} \
         (threshold {nothingness:.1}) -> x {left}..={right}, y {top}..={bottom}"
    );

    Ok(CropRect {
        x: left,
        y: top,
        width: right - left + 1,
        height: bottom - top + 1,
    })
}
