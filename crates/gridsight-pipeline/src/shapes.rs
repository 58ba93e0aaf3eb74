//! Dark-shape merging and classification.
//!
//! After binarisation the puzzle shows up as a cluster of dark cell
//! interiors separated by thin light grid lines. A morphological close of
//! the dark pixels fuses the cluster into one blob; connected-component
//! labelling then finds that blob (the main shape) and everything else
//! (secondary shapes: text, toolbars, other UI).

use std::collections::BTreeMap;

use image::{ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::types::{GrayImage, PipelineError};

/// Per-pixel component labels (0 = background).
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Close the dark pixels of `binary` with a square structuring element.
///
/// Any pixel with a dark neighbour within `radius` (Chebyshev distance)
/// turns dark, then any pixel with a light neighbour within `radius`
/// turns light again. Dark features closer than `2 * radius` fuse.
#[must_use = "returns the merged image"]
pub fn merge_fragments(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    // imageproc treats white as foreground, so growing the dark pixels
    // is an erosion of the light ones.
    let grown = imageproc::morphology::erode(binary, Norm::LInf, radius);
    imageproc::morphology::dilate(&grown, Norm::LInf, radius)
}

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost column.
    pub min_x: u32,
    /// Topmost row.
    pub min_y: u32,
    /// Rightmost column.
    pub max_x: u32,
    /// Bottom row.
    pub max_y: u32,
}

impl BoundingBox {
    const fn point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Long side divided by short side (>= 1.0).
    #[must_use]
    pub fn aspect(&self) -> f64 {
        let w = f64::from(self.width());
        let h = f64::from(self.height());
        w.max(h) / w.min(h)
    }
}

/// One connected dark shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    /// Component label in the [`ShapeMap`] label image.
    pub label: u32,
    /// Pixel count.
    pub area: usize,
    /// Extent of the shape.
    pub bbox: BoundingBox,
}

/// All dark shapes of a binary image.
#[derive(Debug, Clone)]
pub struct ShapeMap {
    /// Component label per pixel (0 for light pixels).
    pub labels: LabelImage,
    /// The largest shape.
    pub main: Shape,
    /// Every other shape, largest first.
    pub secondary: Vec<Shape>,
}

/// Label the dark shapes of `binary` and pick the largest as the puzzle.
///
/// # Errors
///
/// Returns [`PipelineError::NoShapes`] if the image has no dark pixels.
pub fn classify(binary: &GrayImage) -> Result<ShapeMap, PipelineError> {
    let labels = connected_components(binary, Connectivity::Four, Luma([255u8]));

    let mut shapes: BTreeMap<u32, Shape> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 {
            continue;
        }
        shapes
            .entry(label)
            .and_modify(|s| {
                s.area += 1;
                s.bbox.include(x, y);
            })
            .or_insert(Shape {
                label,
                area: 1,
                bbox: BoundingBox::point(x, y),
            });
    }

    let mut shapes: Vec<Shape> = shapes.into_values().collect();
    // Stable sort keeps label order among equal areas.
    shapes.sort_by(|a, b| b.area.cmp(&a.area));
    let mut iter = shapes.into_iter();
    let main = iter.next().ok_or(PipelineError::NoShapes)?;
    let secondary: Vec<Shape> = iter.collect();

    log::debug!(
        "main shape {}x{} ({} px), {} secondary shapes",
        main.bbox.width(),
        main.bbox.height(),
        main.area,
        secondary.len()
    );

    Ok(ShapeMap {
        labels,
        main,
        secondary,
    })
}
