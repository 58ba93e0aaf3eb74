//! Shared types for the gridsight recognition pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// decoded and cropped images without depending on `image` directly.
pub use image::RgbaImage;

/// Smallest grid the pipeline will accept.
pub const MIN_GRID_SIZE: usize = 3;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A sequence of connected points, e.g. one traced contour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Whether the puzzle sits on a light or a dark background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackgroundMode {
    /// Light page, dark grid lines.
    Light,
    /// Dark page (dark theme screenshots, negatives).
    Dark,
}

impl BackgroundMode {
    /// The complementary assumption, used for the retry attempt.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

/// Image axis a set of grid lines runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Lines of constant y.
    Horizontal,
    /// Lines of constant x.
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => f.write_str("horizontal"),
            Self::Vertical => f.write_str("vertical"),
        }
    }
}

/// Axis-aligned pixel rectangle of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CellRect {
    /// Shrink every side by `fraction` of the cell extent.
    ///
    /// `inset(0.15)` keeps the central 70% of the cell. Never shrinks
    /// below a single pixel.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn inset(self, fraction: f64) -> Self {
        let dx = (f64::from(self.width) * fraction).round() as u32;
        let dy = (f64::from(self.height) * fraction).round() as u32;
        let width = self.width.saturating_sub(2 * dx).max(1);
        let height = self.height.saturating_sub(2 * dy).max(1);
        Self {
            x: self.x + dx.min(self.width / 2),
            y: self.y + dy.min(self.height / 2),
            width,
            height,
        }
    }

    /// Centre of the rectangle.
    #[must_use]
    pub const fn center(self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// A `k`×`k` lattice of interior sample points, evenly spaced and
    /// never touching the rectangle edges.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_points(self, k: u32) -> Vec<(u32, u32)> {
        let step_x = f64::from(self.width) / f64::from(k + 1);
        let step_y = f64::from(self.height) / f64::from(k + 1);
        let mut points = Vec::with_capacity((k * k) as usize);
        for j in 1..=k {
            for i in 1..=k {
                let x = self.x + (step_x * f64::from(i)).round() as u32;
                let y = self.y + (step_y * f64::from(j)).round() as u32;
                points.push((x, y));
            }
        }
        points
    }
}

/// Detected grid geometry.
///
/// Invariant: `h_lines.len() == v_lines.len() == grid_size + 1`, both
/// sorted ascending, and `grid_size >= MIN_GRID_SIZE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridStructure {
    /// Number of cells per side (N).
    pub grid_size: usize,
    /// The N+1 y-coordinates of the horizontal grid lines.
    pub h_lines: Vec<u32>,
    /// The N+1 x-coordinates of the vertical grid lines.
    pub v_lines: Vec<u32>,
}

impl GridStructure {
    /// Build a grid structure from reconstructed line positions.
    ///
    /// `grid_size` is the rounded average of the per-axis cell counts.
    /// An axis whose line count disagrees with `grid_size + 1` is
    /// resampled evenly between its first and last line.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::GridTooSmall`] when the rounded size is
    /// below [`MIN_GRID_SIZE`].
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_lines(
        mut h_lines: Vec<u32>,
        mut v_lines: Vec<u32>,
    ) -> Result<Self, PipelineError> {
        h_lines.sort_unstable();
        v_lines.sort_unstable();

        let cells_h = h_lines.len().saturating_sub(1);
        let cells_v = v_lines.len().saturating_sub(1);
        let grid_size = ((cells_h + cells_v) as f64 / 2.0).round() as usize;
        if grid_size < MIN_GRID_SIZE {
            return Err(PipelineError::GridTooSmall { size: grid_size });
        }

        if h_lines.len() != grid_size + 1 {
            h_lines = resample_lines(&h_lines, grid_size);
        }
        if v_lines.len() != grid_size + 1 {
            v_lines = resample_lines(&v_lines, grid_size);
        }

        Ok(Self {
            grid_size,
            h_lines,
            v_lines,
        })
    }

    /// Pixel rectangle of the cell at (`row`, `col`).
    ///
    /// Both indices must be below `grid_size`.
    #[must_use]
    pub fn cell_rect(&self, row: usize, col: usize) -> CellRect {
        let x = self.v_lines[col];
        let y = self.h_lines[row];
        CellRect {
            x,
            y,
            width: self.v_lines[col + 1].saturating_sub(x).max(1),
            height: self.h_lines[row + 1].saturating_sub(y).max(1),
        }
    }

    /// Bounding rectangle spanned by the outermost lines, as
    /// `(left, top, right, bottom)`.
    #[must_use]
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        let first = |lines: &[u32]| lines.first().copied().unwrap_or(0);
        let last = |lines: &[u32]| lines.last().copied().unwrap_or(0);
        (
            first(&self.v_lines),
            first(&self.h_lines),
            last(&self.v_lines),
            last(&self.h_lines),
        )
    }

    /// Mean cell edge length in pixels.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_size(&self) -> f64 {
        let (left, top, right, bottom) = self.bounds();
        let span = f64::from(right - left) + f64::from(bottom - top);
        span / (2.0 * self.grid_size as f64)
    }

    /// The same grid with every line position multiplied by `factor`.
    ///
    /// Maps a structure detected at working resolution onto a
    /// differently sized copy of the same image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |lines: &[u32]| {
            lines
                .iter()
                .map(|&p| (f64::from(p) * factor).round().max(0.0) as u32)
                .collect()
        };
        Self {
            grid_size: self.grid_size,
            h_lines: scale(&self.h_lines),
            v_lines: scale(&self.v_lines),
        }
    }
}

/// Evenly spaced `cells + 1` positions between the first and last line.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn resample_lines(lines: &[u32], cells: usize) -> Vec<u32> {
    let first = f64::from(lines.first().copied().unwrap_or(0));
    let last = f64::from(lines.last().copied().unwrap_or(0));
    let step = (last - first) / cells as f64;
    (0..=cells)
        .map(|i| step.mul_add(i as f64, first).round() as u32)
        .collect()
}

/// Borders a cell draws on its bottom and right sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionBorders {
    /// The cell below belongs to a different region (or this is the last row).
    pub bottom: bool,
    /// The cell to the right belongs to a different region (or this is the last column).
    pub right: bool,
}

/// One recognised grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Zero-based row index.
    pub row: usize,
    /// Zero-based column index.
    pub col: usize,
    /// Region id in `1..=N`.
    pub region: u32,
    /// Region walls on the bottom and right sides.
    pub region_borders: RegionBorders,
}

/// The recognised puzzle grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleGrid {
    /// Cells per side (N).
    pub size: usize,
    /// All N² cells in row-major order.
    pub cells: Vec<Cell>,
}

impl PuzzleGrid {
    /// Stars per row, column and region for the standard puzzle sizes.
    ///
    /// Returns `None` for sizes that have no standard definition.
    #[must_use]
    pub const fn stars_per_region(&self) -> Option<u8> {
        match self.size {
            5 | 6 | 8 => Some(1),
            10 => Some(2),
            14 => Some(3),
            17 => Some(4),
            21 => Some(5),
            25 => Some(6),
            _ => None,
        }
    }

    /// The cell at (`row`, `col`), if inside the grid.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells.get(row * self.size + col)
    }
}

/// A hand-drawn player mark found inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// A placed star.
    Star,
    /// A secondary "no star here" mark.
    Dot,
}

/// A mark reported by the annotation detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Zero-based row index.
    pub row: usize,
    /// Zero-based column index.
    pub col: usize,
    /// What was drawn.
    #[serde(rename = "type")]
    pub mark: Mark,
}

/// Final output of a successful recognition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// The recovered grid and its region partition.
    pub grid: PuzzleGrid,
    /// Detected player marks (empty when no detector is configured).
    pub annotations: Vec<Annotation>,
}

/// Configuration for the recognition pipeline.
///
/// Every tunable of every stage lives here. The colour and geometry
/// thresholds are empirically tuned values kept under their original
/// magnitudes; recalibrate them against a photo corpus before changing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest axis of the analysis copy, in pixels.
    pub working_resolution: u32,

    /// Resampling filter used to build the analysis copy.
    pub downsample_filter: DownsampleFilter,

    /// Force a background assumption instead of detecting it from the
    /// mean luminance.
    pub background: Option<BackgroundMode>,

    /// Radius of the morphological close that merges shape fragments.
    pub merge_radius: u8,

    /// Largest tolerated deviation of the main shape from square
    /// (`long side / short side - 1`).
    pub max_aspect_deviation: f64,

    /// Secondary shapes smaller than this fraction of the image width
    /// are ignored by the crop.
    pub large_section_fraction: f64,

    /// A side is only cropped when the empty gap between the main shape
    /// and the nearest large secondary shape exceeds this fraction of
    /// the image width.
    pub big_nothingness_fraction: f64,

    /// Padding kept around the main shape on cropped sides, as a
    /// fraction of the image width.
    pub crop_padding_fraction: f64,

    /// Squared RGB distance under which the background flood fill
    /// treats a pixel as part of the background.
    pub flood_tolerance_sq: u32,

    /// Minimum fraction of pixels the background flood fill must cover
    /// to be kept.
    pub min_flood_coverage: f64,

    /// Adjacent cells whose logic colours differ by more than this get a
    /// synthetic wall.
    pub border_color_distance: f64,

    /// Adjacent cells whose logic colours differ by less than this get a
    /// synthetic connection.
    pub connect_color_distance: f64,

    /// Adjacent cells closer than this count as similar for the
    /// background-inversion heuristic.
    pub similar_cell_distance: f64,

    /// Fraction of similar adjacent pairs above which a dark image is
    /// inverted.
    pub similar_pair_ratio: f64,

    /// First brightness value tried by the durability sweep.
    pub sweep_start: u8,

    /// Largest brightness value of the sweep (the sweep covers `0..=sweep_max`).
    pub sweep_max: u8,

    /// Re-blur and re-binarise the matching candidate before building
    /// the ownership map.
    pub reblur_ownership: bool,
}

impl PipelineConfig {
    /// Default working resolution (max dimension in pixels).
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 1000;
    /// Default downsample filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;
    /// Default shape merge radius.
    pub const DEFAULT_MERGE_RADIUS: u8 = 5;
    /// Default squareness tolerance.
    pub const DEFAULT_MAX_ASPECT_DEVIATION: f64 = 0.25;
    /// Default large-section threshold.
    pub const DEFAULT_LARGE_SECTION_FRACTION: f64 = 0.01;
    /// Default big-nothingness threshold.
    pub const DEFAULT_BIG_NOTHINGNESS_FRACTION: f64 = 0.02;
    /// Default crop padding.
    pub const DEFAULT_CROP_PADDING_FRACTION: f64 = 0.02;
    /// Default background flood tolerance (squared RGB distance).
    pub const DEFAULT_FLOOD_TOLERANCE_SQ: u32 = 900;
    /// Default minimum flood coverage.
    pub const DEFAULT_MIN_FLOOD_COVERAGE: f64 = 0.25;
    /// Default wall threshold for the colour enhancer.
    pub const DEFAULT_BORDER_COLOR_DISTANCE: f64 = 92.0;
    /// Default connection threshold for the colour enhancer.
    pub const DEFAULT_CONNECT_COLOR_DISTANCE: f64 = 15.0;
    /// Default similarity threshold for the inversion heuristic.
    pub const DEFAULT_SIMILAR_CELL_DISTANCE: f64 = 25.0;
    /// Default similar-pair ratio for the inversion heuristic.
    pub const DEFAULT_SIMILAR_PAIR_RATIO: f64 = 0.8;
    /// Default first sweep value.
    pub const DEFAULT_SWEEP_START: u8 = 120;
    /// Default last sweep value.
    pub const DEFAULT_SWEEP_MAX: u8 = 200;

    /// Check the invariants the stages rely on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.working_resolution < 16 {
            return Err(PipelineError::InvalidConfig(format!(
                "working_resolution must be at least 16, got {}",
                self.working_resolution
            )));
        }
        let fractions = [
            ("max_aspect_deviation", self.max_aspect_deviation),
            ("large_section_fraction", self.large_section_fraction),
            ("big_nothingness_fraction", self.big_nothingness_fraction),
            ("crop_padding_fraction", self.crop_padding_fraction),
            ("min_flood_coverage", self.min_flood_coverage),
            ("similar_pair_ratio", self.similar_pair_ratio),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        if self.connect_color_distance >= self.border_color_distance {
            return Err(PipelineError::InvalidConfig(format!(
                "connect_color_distance ({}) must be below border_color_distance ({})",
                self.connect_color_distance, self.border_color_distance
            )));
        }
        if self.sweep_start > self.sweep_max {
            return Err(PipelineError::InvalidConfig(format!(
                "sweep_start ({}) must not exceed sweep_max ({})",
                self.sweep_start, self.sweep_max
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            background: None,
            merge_radius: Self::DEFAULT_MERGE_RADIUS,
            max_aspect_deviation: Self::DEFAULT_MAX_ASPECT_DEVIATION,
            large_section_fraction: Self::DEFAULT_LARGE_SECTION_FRACTION,
            big_nothingness_fraction: Self::DEFAULT_BIG_NOTHINGNESS_FRACTION,
            crop_padding_fraction: Self::DEFAULT_CROP_PADDING_FRACTION,
            flood_tolerance_sq: Self::DEFAULT_FLOOD_TOLERANCE_SQ,
            min_flood_coverage: Self::DEFAULT_MIN_FLOOD_COVERAGE,
            border_color_distance: Self::DEFAULT_BORDER_COLOR_DISTANCE,
            connect_color_distance: Self::DEFAULT_CONNECT_COLOR_DISTANCE,
            similar_cell_distance: Self::DEFAULT_SIMILAR_CELL_DISTANCE,
            similar_pair_ratio: Self::DEFAULT_SIMILAR_PAIR_RATIO,
            sweep_start: Self::DEFAULT_SWEEP_START,
            sweep_max: Self::DEFAULT_SWEEP_MAX,
            reblur_ownership: true,
        }
    }
}

/// How the controller treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Input or environment is unusable; no retry can help.
    Fatal,
    /// The geometry did not look like a square grid; retry with the
    /// complementary background assumption.
    GeometryRejection,
    /// Every candidate binarisation was rejected.
    ExhaustedSearch,
}

/// Errors that can occur during recognition.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// An external collaborator (unwarp, annotation detection) failed.
    #[error("{stage} failed: {message}")]
    Collaborator {
        /// Which collaborator failed.
        stage: String,
        /// Its error message.
        message: String,
    },

    /// Thresholding left no dark shapes to analyse.
    #[error("no distinct shapes found in the image")]
    NoShapes,

    /// The largest shape is too far from square to be a puzzle.
    #[error("main shape is not square (aspect ratio {aspect:.2})")]
    NonSquareShape {
        /// Long side divided by short side.
        aspect: f64,
    },

    /// Too few grid line candidates survived reconstruction.
    #[error("found only {found} {axis} grid lines, need at least 3")]
    InsufficientLines {
        /// The deficient axis.
        axis: Axis,
        /// How many lines were reconstructed.
        found: usize,
    },

    /// The reconstructed grid is smaller than [`MIN_GRID_SIZE`].
    #[error("detected grid size {size} is below the minimum of 3")]
    GridTooSmall {
        /// The rounded grid size.
        size: usize,
    },

    /// No brightness produced a valid decomposition into N regions.
    #[error("could not separate the grid into {size} valid regions")]
    NoRegionMatch {
        /// The expected region count.
        size: usize,
    },
}

impl PipelineError {
    /// Classify the error for the controller's retry logic.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ImageDecode(_)
            | Self::EmptyInput
            | Self::InvalidConfig(_)
            | Self::Collaborator { .. } => ErrorClass::Fatal,
            Self::NoShapes
            | Self::NonSquareShape { .. }
            | Self::InsufficientLines { .. }
            | Self::GridTooSmall { .. } => ErrorClass::GeometryRejection,
            Self::NoRegionMatch { .. } => ErrorClass::ExhaustedSearch,
        }
    }
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
    Collaborator { stage: String, message: String },
    NoShapes,
    NonSquareShape { aspect: f64 },
    InsufficientLines { axis: Axis, found: usize },
    GridTooSmall { size: usize },
    NoRegionMatch { size: usize },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::Collaborator { stage, message } => PipelineErrorProxy::Collaborator {
                stage: stage.clone(),
                message: message.clone(),
            },
            Self::NoShapes => PipelineErrorProxy::NoShapes,
            Self::NonSquareShape { aspect } => PipelineErrorProxy::NonSquareShape { aspect: *aspect },
            Self::InsufficientLines { axis, found } => PipelineErrorProxy::InsufficientLines {
                axis: *axis,
                found: *found,
            },
            Self::GridTooSmall { size } => PipelineErrorProxy::GridTooSmall { size: *size },
            Self::NoRegionMatch { size } => PipelineErrorProxy::NoRegionMatch { size: *size },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be reconstructed; keep the message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::Collaborator { stage, message } => {
                Self::Collaborator { stage, message }
            }
            PipelineErrorProxy::NoShapes => Self::NoShapes,
            PipelineErrorProxy::NonSquareShape { aspect } => Self::NonSquareShape { aspect },
            PipelineErrorProxy::InsufficientLines { axis, found } => {
                Self::InsufficientLines { axis, found }
            }
            PipelineErrorProxy::GridTooSmall { size } => Self::GridTooSmall { size },
            PipelineErrorProxy::NoRegionMatch { size } => Self::NoRegionMatch { size },
        })
    }
}
