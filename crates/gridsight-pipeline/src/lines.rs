//! Grid line detection.
//!
//! Finds the horizontal and vertical lines of a cropped puzzle:
//!
//! 1. Mark pixels whose luminance differs strongly from the median (the
//!    typical cell colour) and trace the borders of the marks.
//! 2. Simplify each border to a polygon and keep the long edges that run
//!    close to horizontal or vertical.
//! 3. Merge nearby positions on each axis into candidates.
//! 4. Estimate the dominant spacing, find the longest evenly spaced run
//!    of candidates, and extend it across the image into a full lattice
//!    that snaps to real candidates. Lines the trace missed, interior or
//!    outer, are filled in at their lattice positions.
//!
//! The two axes are reconstructed independently and combined into a
//! [`GridStructure`].

use std::collections::BTreeMap;

use image::Luma;
use serde::{Deserialize, Serialize};

use crate::contour::{ContourTracer, ContourTracerKind};
use crate::grayscale::luminance_image;
use crate::simplify::simplify_closed;
use crate::types::{Axis, GrayImage, GridStructure, PipelineError, Point, RgbaImage};

/// Luminance difference from the median that marks a line pixel.
pub const LINE_CONTRAST: u8 = 40;

/// Largest deviation from an axis, in degrees, for a line segment.
pub const MAX_ANGLE_DEG: f64 = 10.0;

/// Minimum segment length as a fraction of the image width.
pub const MIN_SEGMENT_FRACTION: f64 = 0.05;

/// Candidates closer than this many pixels are merged.
pub const MERGE_DISTANCE: f64 = 10.0;

/// Gaps at or below this many pixels are ignored when estimating spacing.
pub const MIN_SPACING: f64 = 10.0;

/// Relative deviation from the spacing tolerated inside a regular run.
pub const RUN_TOLERANCE: f64 = 0.35;

/// Relative distance within which a lattice position snaps to a candidate.
pub const SNAP_TOLERANCE: f64 = 0.4;

/// Simplification tolerance as a fraction of the image width.
const SIMPLIFY_FRACTION: f64 = 0.005;

/// Smallest simplification tolerance in pixels.
const MIN_SIMPLIFY_TOLERANCE: f64 = 2.0;

/// Result of line detection on one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedLines {
    /// The reconstructed grid.
    pub structure: GridStructure,
    /// Axis-aligned segments found on the traced borders.
    pub segments: usize,
    /// Merged horizontal candidates before reconstruction.
    pub h_candidates: usize,
    /// Merged vertical candidates before reconstruction.
    pub v_candidates: usize,
}

/// Median of a luminance image.
#[must_use]
pub fn median_luminance(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in gray.pixels() {
        histogram[usize::from(p.0[0])] += 1;
    }
    let total: u64 = histogram.iter().sum();
    let half = total.div_ceil(2);
    let mut seen = 0;
    for (value, &count) in (0u8..=255).zip(histogram.iter()) {
        seen += count;
        if seen >= half && seen > 0 {
            return value;
        }
    }
    0
}

/// Mask of pixels whose luminance differs from the median by more than
/// [`LINE_CONTRAST`].
#[must_use = "returns the line mask"]
pub fn line_mask(image: &RgbaImage) -> GrayImage {
    let gray = luminance_image(image);
    let median = median_luminance(&gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        if v.abs_diff(median) > LINE_CONTRAST {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Axis-aligned segment positions collected from polygon edges.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Segments {
    /// Mean y of every near-horizontal edge.
    pub horizontal: Vec<f64>,
    /// Mean x of every near-vertical edge.
    pub vertical: Vec<f64>,
}

impl Segments {
    /// Classify one polygon edge, ignoring short or diagonal ones.
    pub fn push_edge(&mut self, a: Point, b: Point, min_length: f64) {
        let dx = (b.x - a.x).abs();
        let dy = (b.y - a.y).abs();
        if dx.hypot(dy) < min_length {
            return;
        }
        let angle = dy.atan2(dx).to_degrees();
        if angle <= MAX_ANGLE_DEG {
            self.horizontal.push(f64::midpoint(a.y, b.y));
        } else if angle >= 90.0 - MAX_ANGLE_DEG {
            self.vertical.push(f64::midpoint(a.x, b.x));
        }
    }

    /// Total number of accepted edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.horizontal.len() + self.vertical.len()
    }

    /// Returns `true` if no edge was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trace the line mask and collect axis-aligned polygon edges.
#[must_use]
pub fn collect_segments(image: &RgbaImage, tracer: &impl ContourTracer) -> Segments {
    let width = f64::from(image.width());
    let min_length = width * MIN_SEGMENT_FRACTION;
    let tolerance = (width * SIMPLIFY_FRACTION).max(MIN_SIMPLIFY_TOLERANCE);

    let mask = line_mask(image);
    let mut segments = Segments::default();
    for contour in tracer.trace(&mask) {
        let polygon = simplify_closed(&contour, tolerance);
        for edge in polygon.points().windows(2) {
            segments.push_edge(edge[0], edge[1], min_length);
        }
    }
    segments
}

/// Sort positions and merge those within [`MERGE_DISTANCE`] of the
/// running mean of their cluster.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn merge_positions(positions: &[f64]) -> Vec<f64> {
    let mut sorted = positions.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut merged = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;
    for p in sorted {
        if count > 0 && p - sum / count as f64 > MERGE_DISTANCE {
            merged.push(sum / count as f64);
            sum = 0.0;
            count = 0;
        }
        sum += p;
        count += 1;
    }
    if count > 0 {
        merged.push(sum / count as f64);
    }
    merged
}

/// Most frequent rounded gap above [`MIN_SPACING`]; ties go to the
/// smaller gap.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn dominant_spacing(positions: &[f64]) -> Option<f64> {
    let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
    for pair in positions.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > MIN_SPACING {
            *histogram.entry(gap.round() as u32).or_default() += 1;
        }
    }
    let mut best: Option<(u32, usize)> = None;
    for (gap, count) in histogram {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((gap, count));
        }
    }
    best.map(|(gap, _)| f64::from(gap))
}

/// Index range of the longest run whose consecutive gaps all lie within
/// [`RUN_TOLERANCE`] of `spacing`. Ties go to the earliest run.
#[must_use]
pub fn longest_regular_run(positions: &[f64], spacing: f64) -> (usize, usize) {
    let mut best = (0, 0);
    let mut start = 0;
    for i in 1..positions.len() {
        let gap = positions[i] - positions[i - 1];
        if (gap - spacing).abs() > RUN_TOLERANCE * spacing {
            start = i;
        }
        if i - start > best.1 - best.0 {
            best = (start, i);
        }
    }
    best
}

/// Rebuild a complete, evenly spaced set of lines from noisy candidates.
///
/// The lattice is anchored on the longest regular run and extended in
/// both directions across the whole `0..extent` range. Each position
/// snaps to the nearest unused candidate within [`SNAP_TOLERANCE`] of the
/// spacing; positions with no candidate stay where the lattice puts them.
/// Candidates off the lattice are dropped.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn reconstruct_lines(candidates: &[f64], extent: u32) -> Vec<u32> {
    let in_bounds = |values: &[f64]| {
        values
            .iter()
            .filter(|&&v| v >= 0.0 && v.round() < f64::from(extent))
            .map(|&v| v.round() as u32)
            .collect::<Vec<u32>>()
    };
    if candidates.len() < 2 {
        return in_bounds(candidates);
    }
    let Some(spacing) = dominant_spacing(candidates) else {
        return in_bounds(candidates);
    };

    let (run_start, run_end) = longest_regular_run(candidates, spacing);
    let delta = if run_end > run_start {
        (candidates[run_end] - candidates[run_start]) / (run_end - run_start) as f64
    } else {
        spacing
    };
    let slack = SNAP_TOLERANCE * delta;
    let upper = f64::from(extent) - 1.0;

    let mut lattice = Vec::new();
    let mut t = candidates[run_start];
    while t - delta >= -slack {
        t -= delta;
    }
    while t <= upper + slack {
        lattice.push(t);
        t += delta;
    }

    let mut used = vec![false; candidates.len()];
    let snapped: Vec<f64> = lattice
        .into_iter()
        .map(|t| {
            let nearest = candidates
                .iter()
                .enumerate()
                .filter(|&(i, c)| !used[i] && (c - t).abs() <= slack)
                .min_by(|a, b| (a.1 - t).abs().total_cmp(&(b.1 - t).abs()));
            nearest.map_or(t, |(i, &c)| {
                used[i] = true;
                c
            })
        })
        .collect();
    in_bounds(&snapped)
}

/// Detect the grid in a cropped puzzle image.
///
/// # Errors
///
/// Returns [`PipelineError::InsufficientLines`] if either axis ends up
/// with fewer than 3 lines, or [`PipelineError::GridTooSmall`] if the
/// combined size is below 3.
pub fn detect_grid(image: &RgbaImage) -> Result<DetectedLines, PipelineError> {
    let segments = collect_segments(image, &ContourTracerKind::default());
    let h_candidates = merge_positions(&segments.horizontal);
    let v_candidates = merge_positions(&segments.vertical);
    log::debug!(
        "{} segments -> {} horizontal / {} vertical candidates",
        segments.len(),
        h_candidates.len(),
        v_candidates.len()
    );

    let h_lines = reconstruct_lines(&h_candidates, image.height());
    let v_lines = reconstruct_lines(&v_candidates, image.width());
    for (axis, lines) in [(Axis::Horizontal, &h_lines), (Axis::Vertical, &v_lines)] {
        if lines.len() < 3 {
            return Err(PipelineError::InsufficientLines {
                axis,
                found: lines.len(),
            });
        }
    }

    let structure = GridStructure::from_lines(h_lines, v_lines)?;
    log::info!(
        "detected {0}x{0} grid, cell size {1:.1}px",
        structure.grid_size,
        structure.cell_size()
    );
    Ok(DetectedLines {
        structure,
        segments: segments.len(),
        h_candidates: h_candidates.len(),
        v_candidates: v_candidates.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn median_of_mostly_white() {
        let gray = GrayImage::from_fn(10, 10, |x, _| if x < 3 { Luma([0]) } else { Luma([250]) });
        assert_eq!(median_luminance(&gray), 250);
    }

    #[test]
    fn mask_marks_contrasting_pixels() {
        let img = RgbaImage::from_fn(10, 10, |x, _| match x {
            0 => Rgba([0, 0, 0, 255]),
            1 => Rgba([150, 150, 150, 255]),
            2 => Rgba([220, 220, 220, 255]),
            _ => Rgba([235, 235, 235, 255]),
        });
        let mask = line_mask(&img);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(1, 0).0[0], 255);
        assert_eq!(mask.get_pixel(2, 0).0[0], 0);
        assert_eq!(mask.get_pixel(5, 0).0[0], 0);
    }

    #[test]
    fn edges_are_classified_by_angle() {
        let mut segments = Segments::default();
        segments.push_edge(Point::new(0.0, 10.0), Point::new(40.0, 12.0), 5.0);
        segments.push_edge(Point::new(7.0, 0.0), Point::new(9.0, 40.0), 5.0);
        segments.push_edge(Point::new(0.0, 0.0), Point::new(30.0, 30.0), 5.0);
        segments.push_edge(Point::new(0.0, 0.0), Point::new(3.0, 0.0), 5.0);
        assert_eq!(segments.horizontal, vec![11.0]);
        assert_eq!(segments.vertical, vec![8.0]);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn nearby_positions_merge_to_their_mean() {
        let merged = merge_positions(&[52.0, 10.0, 12.0, 50.0, 11.0, 90.0]);
        assert_eq!(merged, vec![11.0, 51.0, 90.0]);
    }

    #[test]
    fn spacing_prefers_most_common_gap() {
        let spacing = dominant_spacing(&[0.0, 40.0, 80.0, 121.0, 160.0, 200.0, 205.0]);
        assert_eq!(spacing, Some(40.0));
    }

    #[test]
    fn spacing_tie_goes_to_smaller_gap() {
        assert_eq!(dominant_spacing(&[0.0, 30.0, 70.0]), Some(30.0));
    }

    #[test]
    fn spacing_needs_a_real_gap() {
        assert_eq!(dominant_spacing(&[0.0, 5.0, 9.0]), None);
    }

    #[test]
    fn run_skips_irregular_prefix() {
        let positions = [0.0, 13.0, 53.0, 93.0, 133.0, 173.0];
        assert_eq!(longest_regular_run(&positions, 40.0), (1, 5));
    }

    #[test]
    fn regular_lines_are_kept_as_is() {
        let lines = reconstruct_lines(&[4.0, 43.0, 83.0, 123.0, 163.0, 202.0], 207);
        assert_eq!(lines, vec![4, 43, 83, 123, 163, 202]);
    }

    #[test]
    fn missing_interior_line_is_filled() {
        let lines = reconstruct_lines(&[10.0, 50.0, 130.0, 170.0, 210.0], 230);
        assert_eq!(lines, vec![10, 50, 90, 130, 170, 210]);
    }

    #[test]
    fn stray_candidate_between_lines_is_dropped() {
        let lines = reconstruct_lines(&[10.0, 50.0, 68.0, 90.0, 130.0, 170.0], 200);
        assert_eq!(lines, vec![10, 50, 90, 130, 170]);
    }

    #[test]
    fn missing_frame_lines_are_rebuilt() {
        let lines = reconstruct_lines(&[50.0, 90.0, 130.0, 170.0], 215);
        assert_eq!(lines, vec![10, 50, 90, 130, 170, 210]);
    }

    #[test]
    fn lattice_snaps_to_an_outer_candidate_near_the_edge() {
        // The last line sits on the final pixel row.
        let lines = reconstruct_lines(&[41.0, 81.0, 121.0, 162.0], 163);
        assert_eq!(lines, vec![1, 41, 81, 121, 162]);
    }

    #[test]
    fn lattice_stays_inside_the_image() {
        let lines = reconstruct_lines(&[30.0, 70.0, 110.0, 150.0], 200);
        assert_eq!(lines, vec![30, 70, 110, 150, 190]);
    }

    #[test]
    fn single_candidate_is_passed_through() {
        assert_eq!(reconstruct_lines(&[12.4], 50), vec![12]);
    }

    #[test]
    fn blank_image_has_insufficient_lines() {
        let img = RgbaImage::from_pixel(100, 100, Rgba([240, 240, 240, 255]));
        assert!(matches!(
            detect_grid(&img),
            Err(PipelineError::InsufficientLines { found: 0, .. })
        ));
    }

    #[test]
    fn ruled_grid_is_detected() {
        // 4x4 grid of 30px cells with 2px black lines on white.
        let img = RgbaImage::from_fn(126, 126, |x, y| {
            let on_line = |v: u32| (2..=123).contains(&v) && (v - 2) % 30 < 2;
            let inside = (2..=123).contains(&x) && (2..=123).contains(&y);
            if inside && (on_line(x) || on_line(y)) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([250, 250, 250, 255])
            }
        });
        let detected = detect_grid(&img).unwrap();
        assert_eq!(detected.structure.grid_size, 4);
        for (i, &p) in (0u32..).zip(&detected.structure.v_lines) {
            let expected = 30.0f64.mul_add(f64::from(i), 2.5);
            assert!((f64::from(p) - expected).abs() <= 1.5, "line {i} at {p}");
        }
    }
}
