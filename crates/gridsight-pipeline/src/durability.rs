//! Line durability filter.
//!
//! Thin grid lines inside a region and thick walls between regions differ
//! mainly in how much brightening they survive. The filter binarises the
//! cropped puzzle at a sequence of brightness offsets, counts the light
//! regions that cover cell interiors, and accepts the first offset at
//! which exactly N regions remain and their ownership map validates. If
//! no offset works, one more sweep runs on a slightly blurred copy.

use std::collections::BTreeSet;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::blur::{ONE_PIXEL_SIGMA, gaussian_blur, gaussian_blur_rgba};
use crate::grayscale::luminance;
use crate::ownership::{OwnershipMap, SAMPLES_PER_SIDE};
use crate::shapes::LabelImage;
use crate::types::{GridStructure, PipelineConfig, PipelineError, RgbaImage};

/// Brightness at which the shift is zero.
pub const NEUTRAL_BRIGHTNESS: i16 = 100;

/// Luminance at or above which a shifted pixel is light.
pub const LIGHT_CUTOFF: u8 = 128;

/// Brightness offsets in trial order: `start..=max`, then `0..start`.
pub fn sweep_order(start: u8, max: u8) -> impl Iterator<Item = u8> {
    (start..=max).chain(0..start)
}

/// Binarise `image` after shifting every channel by
/// `brightness - NEUTRAL_BRIGHTNESS`, writing into `out`.
///
/// `out` must have the same dimensions as `image`.
pub fn binarize_shifted(image: &RgbaImage, brightness: u8, out: &mut GrayImage) {
    let shift = i16::from(brightness) - NEUTRAL_BRIGHTNESS;
    let apply = |v: u8| -> u8 {
        let shifted = (i16::from(v) + shift).clamp(0, 255);
        u8::try_from(shifted).unwrap_or(u8::MAX)
    };
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let lum = luminance(&image::Rgba([apply(r), apply(g), apply(b), a]));
        *dst = Luma([if lum >= LIGHT_CUTOFF { 255 } else { 0 }]);
    }
}

/// Label light components (4-connected) of a binary image.
#[must_use]
pub fn label_light(binary: &GrayImage) -> LabelImage {
    connected_components(binary, Connectivity::Four, Luma([0u8]))
}

/// Light components covering at least one cell sample point.
#[must_use]
pub fn count_regions(labels: &LabelImage, grid: &GridStructure) -> usize {
    let n = grid.grid_size;
    let mut hit = BTreeSet::new();
    for row in 0..n {
        for col in 0..n {
            for (x, y) in grid.cell_rect(row, col).sample_points(SAMPLES_PER_SIDE) {
                if let Some(p) = labels.get_pixel_checked(x, y) {
                    if p.0[0] != 0 {
                        hit.insert(p.0[0]);
                    }
                }
            }
        }
    }
    hit.len()
}

/// Reusable per-sweep buffers.
///
/// A sweep may try hundreds of offsets on a large image; binarising into
/// the same buffer avoids one allocation per trial.
#[derive(Debug)]
pub struct ScratchBuffers {
    binary: GrayImage,
}

impl ScratchBuffers {
    /// Buffers for images of `width`×`height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            binary: GrayImage::new(width, height),
        }
    }

    fn fit(&mut self, width: u32, height: u32) {
        if self.binary.dimensions() != (width, height) {
            self.binary = GrayImage::new(width, height);
        }
    }
}

/// An accepted binarisation.
#[derive(Debug, Clone)]
pub struct DurabilityMatch {
    /// The winning brightness offset.
    pub brightness: u8,
    /// The binary image the ownership map was built from.
    pub binary: GrayImage,
    /// The validated ownership map.
    pub ownership: OwnershipMap,
    /// Whether the match came from the blurred fallback sweep.
    pub blur_fallback: bool,
    /// Offsets tried, including the winner.
    pub trials: usize,
}

/// Summary of a match, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurabilitySummary {
    /// The winning brightness offset.
    pub brightness: u8,
    /// Whether the blurred fallback sweep was needed.
    pub blur_fallback: bool,
    /// Offsets tried, including the winner.
    pub trials: usize,
}

impl DurabilityMatch {
    /// Brightness, fallback flag and trial count.
    #[must_use]
    pub const fn summary(&self) -> DurabilitySummary {
        DurabilitySummary {
            brightness: self.brightness,
            blur_fallback: self.blur_fallback,
            trials: self.trials,
        }
    }
}

/// Blur a binary image by one pixel and threshold it again.
fn reblur(binary: &GrayImage) -> GrayImage {
    let mut blurred = gaussian_blur(binary, ONE_PIXEL_SIGMA);
    for p in blurred.pixels_mut() {
        p.0[0] = if p.0[0] >= LIGHT_CUTOFF { 255 } else { 0 };
    }
    blurred
}

/// Try one offset; returns the binary and ownership on success.
fn try_offset(
    image: &RgbaImage,
    grid: &GridStructure,
    brightness: u8,
    config: &PipelineConfig,
    scratch: &mut ScratchBuffers,
) -> Option<(GrayImage, OwnershipMap)> {
    binarize_shifted(image, brightness, &mut scratch.binary);
    let labels = label_light(&scratch.binary);
    if count_regions(&labels, grid) != grid.grid_size {
        return None;
    }

    let (binary, labels) = if config.reblur_ownership {
        let smoothed = reblur(&scratch.binary);
        let smoothed_labels = label_light(&smoothed);
        if count_regions(&smoothed_labels, grid) == grid.grid_size {
            (smoothed, smoothed_labels)
        } else {
            (scratch.binary.clone(), labels)
        }
    } else {
        (scratch.binary.clone(), labels)
    };

    let ownership = OwnershipMap::from_labels(&labels, grid);
    match ownership.validate() {
        Ok(()) => Some((binary, ownership)),
        Err(e) => {
            log::trace!("brightness {brightness}: {e}");
            None
        }
    }
}

fn sweep(
    image: &RgbaImage,
    grid: &GridStructure,
    config: &PipelineConfig,
    scratch: &mut ScratchBuffers,
    blur_fallback: bool,
    trials: &mut usize,
) -> Option<DurabilityMatch> {
    scratch.fit(image.width(), image.height());
    for brightness in sweep_order(config.sweep_start, config.sweep_max) {
        *trials += 1;
        if let Some((binary, ownership)) = try_offset(image, grid, brightness, config, scratch) {
            return Some(DurabilityMatch {
                brightness,
                binary,
                ownership,
                blur_fallback,
                trials: *trials,
            });
        }
    }
    None
}

/// Find a brightness offset that separates `image` into N valid regions.
///
/// # Errors
///
/// Returns [`PipelineError::NoRegionMatch`] when neither the plain nor
/// the blurred sweep finds a valid decomposition.
pub fn find_regions(
    image: &RgbaImage,
    grid: &GridStructure,
    config: &PipelineConfig,
    scratch: &mut ScratchBuffers,
) -> Result<DurabilityMatch, PipelineError> {
    let mut trials = 0;
    if let Some(found) = sweep(image, grid, config, scratch, false, &mut trials) {
        log::info!("regions separated at brightness {}", found.brightness);
        return Ok(found);
    }

    log::debug!("plain sweep failed after {trials} trials, retrying on blurred copy");
    let blurred = gaussian_blur_rgba(image, ONE_PIXEL_SIGMA);
    if let Some(found) = sweep(&blurred, grid, config, scratch, true, &mut trials) {
        log::info!(
            "regions separated at brightness {} after blurring",
            found.brightness
        );
        return Ok(found);
    }

    Err(PipelineError::NoRegionMatch {
        size: grid.grid_size,
    })
}
