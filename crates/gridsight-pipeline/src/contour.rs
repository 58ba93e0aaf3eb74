//! Contour tracing over the grid-line mask.
//!
//! The line detector marks every pixel that differs strongly from the
//! typical cell colour, then traces the borders of those marks. A grid
//! yields one outer border around the whole network plus one hole border
//! per cell; the straight runs of those borders are the line candidates.
//!
//! The [`ContourTracer`] trait keeps the tracing algorithm swappable;
//! [`ContourTracerKind`] selects one at runtime.

use image::GrayImage;

use crate::types::{Point, Polyline};

/// Contours with fewer points than this cannot contain a straight run.
pub const MIN_CONTOUR_POINTS: usize = 4;

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// Reports both outer borders and hole borders, which is what makes
    /// each cell show up as its own closed contour.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (white = line pixels, black = everything else).
/// Output: one closed polyline per traced border, first point not
/// repeated at the end.
pub trait ContourTracer {
    /// Trace the borders of the white areas of `mask`.
    fn trace(&self, mask: &GrayImage) -> Vec<Polyline>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage) -> Vec<Polyline> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

fn trace_border_following(mask: &GrayImage) -> Vec<Polyline> {
    let contours: Vec<imageproc::contours::Contour<u32>> = imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .filter(|c| c.points.len() >= MIN_CONTOUR_POINTS)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Polyline::new(points)
        })
        .collect()
}
