//! Isolate the puzzle from a photo or screenshot.
//!
//! Runs on the bounded working copy: optional inversion into dark-page
//! layout, adaptive binarisation, removal of border-connected dark areas,
//! shape merging and classification, then crop planning. The crop is
//! applied to the untouched full-resolution source, so later stages see
//! the original colours and the best available detail.

use crate::background::invert;
use crate::crop::{CropRect, plan_crop};
use crate::downsample::WorkingCopy;
use crate::flood::{clear_border_connected, flatten_background};
use crate::shapes::{classify, merge_fragments};
use crate::threshold::AdaptiveThreshold;
use crate::types::{BackgroundMode, Dimensions, PipelineConfig, PipelineError, RgbaImage};

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// The puzzle cut from the full-resolution source (original colours).
    pub image: RgbaImage,
    /// Crop rectangle in full-resolution coordinates.
    pub crop: CropRect,
    /// Background assumption the analysis ran under.
    pub mode: BackgroundMode,
    /// Binarisation parameters derived from the working copy.
    pub threshold: AdaptiveThreshold,
    /// Number of dark shapes found after merging.
    pub shape_count: usize,
    /// Whether the uniform page background was flattened.
    pub background_flattened: bool,
}

/// Preprocess `full` under the given background assumption.
///
/// `working` must be a downsampled copy of `full`.
///
/// # Errors
///
/// Returns [`PipelineError::NoShapes`] when nothing dark survives
/// thresholding or the border fill runs away, and
/// [`PipelineError::NonSquareShape`] when the main shape is not square.
pub fn preprocess(
    full: &RgbaImage,
    working: &WorkingCopy,
    mode: BackgroundMode,
    config: &PipelineConfig,
) -> Result<Preprocessed, PipelineError> {
    let analysis = match mode {
        BackgroundMode::Light => invert(&working.image),
        BackgroundMode::Dark => working.image.clone(),
    };

    let threshold = AdaptiveThreshold::derive(&analysis);
    let mut binary = threshold.binarize(&analysis);
    let cleared = clear_border_connected(&mut binary).map_err(|_| PipelineError::NoShapes)?;
    log::debug!("cleared {cleared} border-connected pixels");

    let merged = merge_fragments(&binary, config.merge_radius);
    let shapes = classify(&merged)?;
    let rect = plan_crop(&shapes, Dimensions::of(&working.image), config)?;
    let crop = rect.scaled(working.scale, Dimensions::of(full));

    let cut = image::imageops::crop_imm(full, crop.x, crop.y, crop.width, crop.height).to_image();
    let flattened = flatten_background(&cut, config.flood_tolerance_sq, config.min_flood_coverage);
    let background_flattened = flattened.is_some();
    let image = flattened.unwrap_or(cut);

    log::info!(
        "preprocessed under {mode} assumption: crop {}x{} at ({}, {})",
        crop.width,
        crop.height,
        crop.x,
        crop.y
    );

    Ok(Preprocessed {
        image,
        crop,
        mode,
        threshold,
        shape_count: shapes.secondary.len() + 1,
        background_flattened,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::downsample::{DownsampleFilter, downsample};
    use image::Rgba;

    /// A 3x3 board of pastel cells with black lines (frame included),
    /// its top-left corner at `origin` on a white `page`-sized square.
    fn board_on_page(page: u32, origin: u32, cell: u32, line: u32) -> RgbaImage {
        let period = cell + line;
        let end = origin + 3 * period + line - 1;
        RgbaImage::from_fn(page, page, |x, y| {
            let inside = (origin..=end).contains(&x) && (origin..=end).contains(&y);
            if !inside {
                return Rgba([255, 255, 255, 255]);
            }
            let on_line = |v: u32| (v - origin) % period < line;
            if on_line(x) || on_line(y) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 220, 220, 255])
            }
        })
    }

    #[test]
    fn light_board_is_cropped_to_puzzle() {
        let full = board_on_page(200, 55, 29, 2);
        let working = downsample(&full, 1000, DownsampleFilter::Triangle);
        let out = preprocess(&full, &working, BackgroundMode::Light, &PipelineConfig::default())
            .unwrap();
        assert_eq!(out.mode, BackgroundMode::Light);
        // Cells merge into a 91px main shape; 4px padding on each side.
        assert_eq!(out.crop.x, 53, "crop {:?}", out.crop);
        assert_eq!(out.crop.width, 99, "crop {:?}", out.crop);
        assert_eq!(out.shape_count, 1);
        assert_eq!(out.image.width(), out.crop.width);
    }

    #[test]
    fn downsampled_crop_maps_back_to_full_resolution() {
        let full = board_on_page(400, 100, 62, 6);
        let working = downsample(&full, 200, DownsampleFilter::Triangle);
        assert!((working.scale - 2.0).abs() < 1e-9);
        let out = preprocess(&full, &working, BackgroundMode::Light, &PipelineConfig::default())
            .unwrap();
        assert!((90..=106).contains(&out.crop.x), "crop {:?}", out.crop);
        assert!((190..=230).contains(&out.crop.width), "crop {:?}", out.crop);
        assert_eq!(out.image.dimensions(), (out.crop.width, out.crop.height));
    }

    #[test]
    fn blank_page_has_no_shapes() {
        let full = RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255]));
        let working = downsample(&full, 1000, DownsampleFilter::Triangle);
        let result = preprocess(&full, &working, BackgroundMode::Light, &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::NoShapes)));
    }

    #[test]
    fn black_page_has_no_shapes() {
        let full = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]));
        let working = downsample(&full, 1000, DownsampleFilter::Triangle);
        for mode in [BackgroundMode::Light, BackgroundMode::Dark] {
            let result = preprocess(&full, &working, mode, &PipelineConfig::default());
            assert!(matches!(result, Err(PipelineError::NoShapes)), "{mode}");
        }
    }
}
