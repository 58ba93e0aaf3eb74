//! Recognition diagnostics: timing, counts, and other metrics for each
//! stage of every attempt.
//!
//! These diagnostics are permanent instrumentation intended for
//! algorithm tuning and threshold experimentation. Every call to
//! [`recognize_with_diagnostics`](crate::recognize_with_diagnostics)
//! collects them alongside the recognition result, including for
//! attempts that failed and were retried.
//!
//! The crate is sans-IO, so timestamps come from an injected [`Clock`].
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::RegionStrategy;
use crate::crop::CropRect;
use crate::durability::DurabilitySummary;
use crate::types::{BackgroundMode, ErrorClass};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
///
/// Hosts provide an implementation backed by whatever monotonic timer
/// their platform offers.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Clock that reports every stage as taking no time.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, (): &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single recognition run.
///
/// A run that fails before the working copy exists (empty input, decode
/// or configuration errors) leaves every stage empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionDiagnostics {
    /// Image decoding (absent when the caller passed decoded pixels).
    pub decode: Option<StageDiagnostics>,
    /// Working-copy downsampling of the source.
    pub downsample: Option<StageDiagnostics>,
    /// One entry per attempted background assumption, in order.
    pub attempts: Vec<AttemptDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: RecognitionSummary,
}

/// Diagnostics for one attempt under a single background assumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDiagnostics {
    /// The background assumption.
    pub mode: BackgroundMode,
    /// Stages that completed, in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// The attempt produced the returned result.
    Accepted,
    /// The attempt failed.
    Failed {
        /// Classification of the failure.
        class: ErrorClass,
        /// Human-readable cause.
        message: String,
    },
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
    },
    /// Working-copy downsampling.
    Downsample {
        /// Working width in pixels.
        width: u32,
        /// Working height in pixels.
        height: u32,
        /// Source pixels per working pixel.
        scale: f64,
    },
    /// Thresholding, shape analysis and crop.
    Preprocess {
        /// Dominant histogram bin.
        line_luminance: u8,
        /// Binarisation cut-off.
        threshold: u8,
        /// Dark shapes after merging.
        shape_count: usize,
        /// Crop in source coordinates.
        crop: CropRect,
        /// Whether the page background was flattened.
        background_flattened: bool,
    },
    /// One perspective-correction pass.
    Unwarp {
        /// Pass number, starting at 1.
        pass: u8,
        /// Output width.
        width: u32,
        /// Output height.
        height: u32,
    },
    /// Grid line detection.
    GridLines {
        /// Axis-aligned polygon edges found.
        segments: usize,
        /// Horizontal candidates after merging.
        h_candidates: usize,
        /// Vertical candidates after merging.
        v_candidates: usize,
        /// Reconstructed grid size.
        grid_size: usize,
    },
    /// Background-inversion check.
    Inversion {
        /// Whether the top-left pixel was near-black.
        corner_dark: bool,
        /// Fraction of similar adjacent cell pairs.
        similar_ratio: f64,
        /// Whether the image was inverted.
        inverted: bool,
    },
    /// Region colour enhancement.
    Enhance {
        /// Walls drawn.
        walls: usize,
        /// Bridges drawn.
        bridges: usize,
    },
    /// Brightness sweep for one region strategy.
    Durability {
        /// The strategy whose image was swept.
        strategy: RegionStrategy,
        /// The match, or `None` when the sweep was exhausted.
        matched: Option<DurabilitySummary>,
    },
    /// Cell and border extraction.
    Extraction {
        /// Regions in the output grid.
        regions: usize,
    },
    /// Annotation detection.
    Annotations {
        /// Marks found.
        count: usize,
    },
}

impl StageMetrics {
    /// Short stage name for reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "Decode",
            Self::Downsample { .. } => "Downsample",
            Self::Preprocess { .. } => "Preprocess",
            Self::Unwarp { .. } => "Unwarp",
            Self::GridLines { .. } => "Grid Lines",
            Self::Inversion { .. } => "Inversion Check",
            Self::Enhance { .. } => "Enhance",
            Self::Durability { .. } => "Durability",
            Self::Extraction { .. } => "Extraction",
            Self::Annotations { .. } => "Annotations",
        }
    }
}

/// High-level summary of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Number of attempts made.
    pub attempt_count: usize,
    /// Background assumption of the accepted attempt.
    pub mode: Option<BackgroundMode>,
    /// Recovered grid size.
    pub grid_size: Option<usize>,
    /// Strategy that produced the accepted regions.
    pub strategy: Option<RegionStrategy>,
    /// Accepted brightness offset.
    pub brightness: Option<u8>,
}

impl RecognitionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Recognition Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let row = |diag: &StageDiagnostics| {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let name = diag.metrics.name();
            let details = format_metrics(&diag.metrics);
            format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}")
        };

        for diag in self.decode.iter().chain(self.downsample.iter()) {
            lines.push(row(diag));
        }

        for (i, attempt) in self.attempts.iter().enumerate() {
            lines.push(format!("-- attempt {} ({} background)", i + 1, attempt.mode));
            for stage in &attempt.stages {
                lines.push(row(stage));
            }
            match &attempt.outcome {
                AttemptOutcome::Accepted => lines.push("   accepted".to_string()),
                AttemptOutcome::Failed { class, message } => {
                    lines.push(format!("   failed ({class:?}): {message}"));
                }
            }
        }

        lines.push(String::new());
        match (self.summary.grid_size, self.summary.strategy, self.summary.brightness) {
            (Some(size), Some(strategy), Some(brightness)) => lines.push(format!(
                "Grid: {size}x{size}  |  Strategy: {strategy}  |  Brightness: {brightness}",
            )),
            _ => lines.push("Grid: not recognised".to_string()),
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Downsample {
            width,
            height,
            scale,
        } => format!("{width}x{height} (x{scale:.2})"),
        StageMetrics::Preprocess {
            line_luminance,
            threshold,
            shape_count,
            crop,
            background_flattened,
        } => {
            let flat = if *background_flattened { " flattened" } else { "" };
            format!(
                "peak={line_luminance} cut={threshold} shapes={shape_count} crop={}x{}@({},{}){flat}",
                crop.width, crop.height, crop.x, crop.y,
            )
        }
        StageMetrics::Unwarp {
            pass,
            width,
            height,
        } => format!("pass {pass} -> {width}x{height}"),
        StageMetrics::GridLines {
            segments,
            h_candidates,
            v_candidates,
            grid_size,
        } => format!("{segments} segments, h={h_candidates} v={v_candidates} -> {grid_size}x{grid_size}"),
        StageMetrics::Inversion {
            corner_dark,
            similar_ratio,
            inverted,
        } => format!(
            "corner_dark={corner_dark} similar={:.1}% inverted={inverted}",
            similar_ratio * 100.0,
        ),
        StageMetrics::Enhance { walls, bridges } => format!("walls={walls} bridges={bridges}"),
        StageMetrics::Durability { strategy, matched } => match matched {
            Some(m) => {
                let blur = if m.blur_fallback { " (blurred)" } else { "" };
                format!(
                    "{strategy}: brightness={} after {} trials{blur}",
                    m.brightness, m.trials,
                )
            }
            None => format!("{strategy}: no match"),
        },
        StageMetrics::Extraction { regions } => format!("{regions} regions"),
        StageMetrics::Annotations { count } => format!("{count} marks"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> RecognitionDiagnostics {
        RecognitionDiagnostics {
            decode: Some(stage(
                3,
                StageMetrics::Decode {
                    input_bytes: 1000,
                    width: 240,
                    height: 240,
                },
            )),
            downsample: Some(stage(
                0,
                StageMetrics::Downsample {
                    width: 240,
                    height: 240,
                    scale: 1.0,
                },
            )),
            attempts: vec![
                AttemptDiagnostics {
                    mode: BackgroundMode::Dark,
                    stages: Vec::new(),
                    outcome: AttemptOutcome::Failed {
                        class: ErrorClass::GeometryRejection,
                        message: "no distinct shapes found in the image".to_string(),
                    },
                },
                AttemptDiagnostics {
                    mode: BackgroundMode::Light,
                    stages: vec![
                        stage(
                            12,
                            StageMetrics::GridLines {
                                segments: 40,
                                h_candidates: 6,
                                v_candidates: 6,
                                grid_size: 5,
                            },
                        ),
                        stage(
                            30,
                            StageMetrics::Durability {
                                strategy: RegionStrategy::Direct,
                                matched: Some(DurabilitySummary {
                                    brightness: 120,
                                    blur_fallback: false,
                                    trials: 1,
                                }),
                            },
                        ),
                    ],
                    outcome: AttemptOutcome::Accepted,
                },
            ],
            total_duration: Duration::from_millis(50),
            summary: RecognitionSummary {
                image_width: 240,
                image_height: 240,
                attempt_count: 2,
                mode: Some(BackgroundMode::Light),
                grid_size: Some(5),
                strategy: Some(RegionStrategy::Direct),
                brightness: Some(120),
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn no_clock_reports_zero() {
        let start = NoClock.now();
        assert_eq!(NoClock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn report_lists_attempts_and_outcome() {
        let report = sample().report();
        assert!(report.contains("Recognition Diagnostics Report"));
        assert!(report.contains("attempt 1 (dark background)"));
        assert!(report.contains("failed (GeometryRejection)"));
        assert!(report.contains("Grid: 5x5"));
        assert!(report.contains("brightness=120 after 1 trials"));
    }

    #[test]
    fn report_for_failed_run() {
        let mut diag = sample();
        diag.summary.grid_size = None;
        diag.summary.strategy = None;
        diag.summary.brightness = None;
        assert!(diag.report().contains("Grid: not recognised"));
    }

    #[test]
    fn empty_diagnostics_still_report() {
        let report = RecognitionDiagnostics::default().report();
        assert!(report.contains("Image: 0x0"));
        assert!(report.contains("Grid: not recognised"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn diagnostics_round_trip_through_json() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: RecognitionDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attempts.len(), 2);
        assert_eq!(back.total_duration, Duration::from_millis(50));
        assert_eq!(back.attempts[1].outcome, AttemptOutcome::Accepted);
    }
}
