//! Orchestration of a recognition run.
//!
//! A run is a short, explicit plan. The background assumption detected on
//! the working copy (or forced by the config) is tried first and its
//! complement second. Within an attempt the region search tries two
//! strategies in an order that depends on the background: the direct
//! brightness sweep first on light pages, the colour-enhanced redraw
//! first on dark ones.
//!
//! Fatal errors end the run at once. Geometry rejections and exhausted
//! searches move on to the complementary assumption, unless the
//! inversion check already fixed the polarity during the failed attempt.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::background::detect_mode;
use crate::collaborators::Collaborators;
use crate::diagnostics::{
    AttemptDiagnostics, AttemptOutcome, Clock, RecognitionDiagnostics, StageDiagnostics,
    StageMetrics,
};
use crate::downsample::{WorkingCopy, downsample};
use crate::durability::{DurabilityMatch, ScratchBuffers, find_regions};
use crate::enhance::enhance;
use crate::extract::build_grid;
use crate::grayscale::decode;
use crate::inversion;
use crate::lines::detect_grid;
use crate::ownership::OwnershipMap;
use crate::preprocess::preprocess;
use crate::types::{
    BackgroundMode, ErrorClass, GrayImage, GridStructure, PipelineConfig, PipelineError,
    RecognitionResult, RgbaImage,
};

/// Number of perspective-correction passes per attempt.
pub const UNWARP_PASSES: u8 = 2;

/// Coarse progress reported at every stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Decoding and downsampling the input.
    Loading,
    /// Isolating the puzzle under a background assumption.
    Preprocessing(BackgroundMode),
    /// Running a perspective-correction pass.
    Unwarping {
        /// Pass number, starting at 1.
        pass: u8,
    },
    /// Detecting grid lines.
    DetectingGrid,
    /// Running the background-inversion check.
    NormalizingBackground,
    /// Redrawing the puzzle from cell colours.
    EnhancingRegions,
    /// Sweeping brightness offsets for a region strategy.
    FilteringLines(RegionStrategy),
    /// Building the output cells.
    ExtractingCells,
    /// Running the annotation detector.
    DetectingAnnotations,
    /// Starting over with the complementary background assumption.
    Retrying(BackgroundMode),
    /// Recognition succeeded.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("Loading image"),
            Self::Preprocessing(mode) => write!(f, "Isolating puzzle ({mode} background)"),
            Self::Unwarping { pass } => write!(f, "Correcting perspective (pass {pass})"),
            Self::DetectingGrid => f.write_str("Detecting grid lines"),
            Self::NormalizingBackground => f.write_str("Checking background polarity"),
            Self::EnhancingRegions => f.write_str("Enhancing region colours"),
            Self::FilteringLines(strategy) => write!(f, "Separating regions ({strategy})"),
            Self::ExtractingCells => f.write_str("Extracting cells"),
            Self::DetectingAnnotations => f.write_str("Detecting marks"),
            Self::Retrying(mode) => write!(f, "Retrying with {mode} background"),
            Self::Done => f.write_str("Done"),
        }
    }
}

/// How the image handed to the brightness sweep is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionStrategy {
    /// Sweep the normalised image as is.
    Direct,
    /// Sweep the colour-enhanced redraw.
    Enhanced,
}

impl RegionStrategy {
    /// Strategy order for an attempt.
    ///
    /// An image the inversion check flipped is light afterwards, so it
    /// is treated like a light page.
    #[must_use]
    pub const fn order(mode: BackgroundMode, inverted: bool) -> [Self; 2] {
        match (mode, inverted) {
            (BackgroundMode::Light, _) | (BackgroundMode::Dark, true) => {
                [Self::Direct, Self::Enhanced]
            }
            (BackgroundMode::Dark, false) => [Self::Enhanced, Self::Direct],
        }
    }
}

impl fmt::Display for RegionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Enhanced => f.write_str("enhanced"),
        }
    }
}

/// Background assumptions in the order they are tried.
#[must_use]
pub const fn plan(primary: BackgroundMode) -> [BackgroundMode; 2] {
    [primary, primary.opposite()]
}

/// Input to a run.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    /// Encoded image bytes (PNG, JPEG, BMP, WebP).
    Encoded(&'a [u8]),
    /// Already decoded pixels.
    Decoded(&'a RgbaImage),
}

/// The accepted result together with the intermediates that produced it.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The cropped, perspective-corrected puzzle at source resolution.
    pub cropped: RgbaImage,
    /// Source pixels per pixel of the analysis images below.
    pub scale: f64,
    /// The working-resolution image after the inversion check.
    pub analysis: RgbaImage,
    /// The binarisation the ownership map was read from.
    pub binary: GrayImage,
    /// Grid lines in analysis coordinates.
    pub structure: GridStructure,
    /// The validated ownership map.
    pub ownership: OwnershipMap,
    /// The accepted brightness offset.
    pub brightness: u8,
    /// Whether the blurred fallback sweep produced the match.
    pub blur_fallback: bool,
    /// The strategy that produced the match.
    pub strategy: RegionStrategy,
    /// Background assumption of the accepted attempt.
    pub mode: BackgroundMode,
    /// Whether the inversion check flipped the image.
    pub inverted: bool,
    /// The output grid and annotations.
    pub result: RecognitionResult,
}

/// One attempt under a single background assumption.
struct Attempt<'c, C: Clock> {
    mode: BackgroundMode,
    clock: &'c C,
    stages: Vec<StageDiagnostics>,
    settled: bool,
}

impl<'c, C: Clock> Attempt<'c, C> {
    const fn new(mode: BackgroundMode, clock: &'c C) -> Self {
        Self {
            mode,
            clock,
            stages: Vec::new(),
            settled: false,
        }
    }

    /// Run `stage`, recording its duration and metrics on success.
    fn timed<T>(
        &mut self,
        stage: impl FnOnce() -> Result<T, PipelineError>,
        metrics: impl FnOnce(&T) -> StageMetrics,
    ) -> Result<T, PipelineError> {
        let start = self.clock.now();
        let out = stage()?;
        self.stages.push(StageDiagnostics {
            duration: self.clock.elapsed(&start),
            metrics: metrics(&out),
        });
        Ok(out)
    }

    fn run(
        &mut self,
        source: &RgbaImage,
        working: &WorkingCopy,
        config: &PipelineConfig,
        collaborators: Collaborators<'_>,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<StagedResult, PipelineError> {
        let mode = self.mode;

        progress(Stage::Preprocessing(mode));
        let pre = self.timed(
            || preprocess(source, working, mode, config),
            |p| StageMetrics::Preprocess {
                line_luminance: p.threshold.line_luminance,
                threshold: p.threshold.threshold,
                shape_count: p.shape_count,
                crop: p.crop,
                background_flattened: p.background_flattened,
            },
        )?;

        let mut cropped = pre.image;
        for pass in 1..=UNWARP_PASSES {
            progress(Stage::Unwarping { pass });
            cropped = self.timed(
                || collaborators.unwarper.unwarp(&cropped),
                |img| StageMetrics::Unwarp {
                    pass,
                    width: img.width(),
                    height: img.height(),
                },
            )?;
        }

        let WorkingCopy {
            image: analysis,
            scale,
        } = self.timed(
            || {
                Ok(downsample(
                    &cropped,
                    config.working_resolution,
                    config.downsample_filter,
                ))
            },
            |w| StageMetrics::Downsample {
                width: w.image.width(),
                height: w.image.height(),
                scale: w.scale,
            },
        )?;

        progress(Stage::DetectingGrid);
        let lines = self.timed(
            || detect_grid(&analysis),
            |l| StageMetrics::GridLines {
                segments: l.segments,
                h_candidates: l.h_candidates,
                v_candidates: l.v_candidates,
                grid_size: l.structure.grid_size,
            },
        )?;
        let grid = &lines.structure;

        progress(Stage::NormalizingBackground);
        let (normalized, check) = self.timed(
            || Ok(inversion::normalize(analysis, grid, config)),
            |(_, c)| StageMetrics::Inversion {
                corner_dark: c.corner_dark,
                similar_ratio: c.similar_ratio,
                inverted: c.invert,
            },
        )?;
        self.settled = check.invert;

        let (strategy, matched) = self.search_regions(&normalized, grid, check.invert, config, progress)?;

        progress(Stage::ExtractingCells);
        let puzzle = self.timed(
            || Ok(build_grid(&matched.ownership)),
            |g| StageMetrics::Extraction { regions: g.size },
        )?;

        progress(Stage::DetectingAnnotations);
        let full_grid = grid.scaled(scale);
        let annotations = self.timed(
            || collaborators.annotations.detect(&cropped, &full_grid),
            |a| StageMetrics::Annotations { count: a.len() },
        )?;

        log::info!(
            "recognised {0}x{0} grid ({mode} background, {strategy} strategy, brightness {1})",
            puzzle.size,
            matched.brightness
        );

        Ok(StagedResult {
            cropped,
            scale,
            analysis: normalized,
            binary: matched.binary,
            structure: lines.structure,
            ownership: matched.ownership,
            brightness: matched.brightness,
            blur_fallback: matched.blur_fallback,
            strategy,
            mode,
            inverted: check.invert,
            result: RecognitionResult {
                grid: puzzle,
                annotations,
            },
        })
    }

    /// Try both region strategies in order; the first match wins.
    fn search_regions(
        &mut self,
        normalized: &RgbaImage,
        grid: &GridStructure,
        inverted: bool,
        config: &PipelineConfig,
        progress: &mut dyn FnMut(Stage),
    ) -> Result<(RegionStrategy, DurabilityMatch), PipelineError> {
        let mut scratch = ScratchBuffers::new(normalized.width(), normalized.height());
        let mut exhausted = None;

        for strategy in RegionStrategy::order(self.mode, inverted) {
            let enhanced;
            let candidate = match strategy {
                RegionStrategy::Direct => normalized,
                RegionStrategy::Enhanced => {
                    progress(Stage::EnhancingRegions);
                    enhanced = self.timed(
                        || Ok(enhance(normalized, grid, config)),
                        |e| StageMetrics::Enhance {
                            walls: e.walls,
                            bridges: e.bridges,
                        },
                    )?;
                    &enhanced.image
                }
            };

            progress(Stage::FilteringLines(strategy));
            let start = self.clock.now();
            let result = find_regions(candidate, grid, config, &mut scratch);
            self.stages.push(StageDiagnostics {
                duration: self.clock.elapsed(&start),
                metrics: StageMetrics::Durability {
                    strategy,
                    matched: result.as_ref().ok().map(DurabilityMatch::summary),
                },
            });

            match result {
                Ok(matched) => return Ok((strategy, matched)),
                Err(e) if e.class() == ErrorClass::ExhaustedSearch => {
                    log::warn!("{strategy} strategy exhausted: {e}");
                    exhausted = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(exhausted.unwrap_or(PipelineError::NoRegionMatch {
            size: grid.grid_size,
        }))
    }

    fn finish(self, outcome: &Result<StagedResult, PipelineError>) -> AttemptDiagnostics {
        AttemptDiagnostics {
            mode: self.mode,
            stages: self.stages,
            outcome: match outcome {
                Ok(_) => AttemptOutcome::Accepted,
                Err(e) => AttemptOutcome::Failed {
                    class: e.class(),
                    message: e.to_string(),
                },
            },
        }
    }
}

fn run_attempts<C: Clock>(
    input: Input<'_>,
    config: &PipelineConfig,
    collaborators: Collaborators<'_>,
    progress: &mut dyn FnMut(Stage),
    clock: &C,
    diagnostics: &mut RecognitionDiagnostics,
) -> Result<StagedResult, PipelineError> {
    config.validate()?;

    progress(Stage::Loading);
    let source: Cow<'_, RgbaImage> = match input {
        Input::Encoded(bytes) => {
            let start = clock.now();
            let decoded = decode(bytes)?;
            diagnostics.decode = Some(StageDiagnostics {
                duration: clock.elapsed(&start),
                metrics: StageMetrics::Decode {
                    input_bytes: bytes.len(),
                    width: decoded.width(),
                    height: decoded.height(),
                },
            });
            Cow::Owned(decoded)
        }
        Input::Decoded(image) => {
            if image.width() == 0 || image.height() == 0 {
                return Err(PipelineError::EmptyInput);
            }
            Cow::Borrowed(image)
        }
    };
    diagnostics.summary.image_width = source.width();
    diagnostics.summary.image_height = source.height();

    let start = clock.now();
    let working = downsample(&source, config.working_resolution, config.downsample_filter);
    diagnostics.downsample = Some(StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Downsample {
            width: working.image.width(),
            height: working.image.height(),
            scale: working.scale,
        },
    });

    let primary = config.background.unwrap_or_else(|| detect_mode(&working.image));
    let [first, second] = plan(primary);

    let mut attempt = Attempt::new(first, clock);
    let outcome = attempt.run(&source, &working, config, collaborators, progress);
    let settled = attempt.settled;
    diagnostics.attempts.push(attempt.finish(&outcome));

    let retry = match &outcome {
        Ok(_) => false,
        Err(e) if e.class() == ErrorClass::Fatal => false,
        Err(e) if settled => {
            log::info!("{first} attempt failed ({e}); polarity settled, not retrying");
            false
        }
        Err(e) => {
            log::info!("{first} attempt failed ({e}); retrying with {second} background");
            true
        }
    };
    if !retry {
        return outcome;
    }

    progress(Stage::Retrying(second));
    let mut attempt = Attempt::new(second, clock);
    let outcome = attempt.run(&source, &working, config, collaborators, progress);
    diagnostics.attempts.push(attempt.finish(&outcome));
    outcome
}

/// Run the full recognition plan on `input`.
///
/// Diagnostics are returned whether or not recognition succeeded, so
/// failed attempts can be inspected.
pub fn run<C: Clock>(
    input: Input<'_>,
    config: &PipelineConfig,
    collaborators: Collaborators<'_>,
    progress: &mut dyn FnMut(Stage),
    clock: &C,
) -> (Result<StagedResult, PipelineError>, RecognitionDiagnostics) {
    let start = clock.now();
    let mut diagnostics = RecognitionDiagnostics::default();
    let result = run_attempts(input, config, collaborators, progress, clock, &mut diagnostics);
    diagnostics.total_duration = clock.elapsed(&start);
    diagnostics.summary.attempt_count = diagnostics.attempts.len();

    match &result {
        Ok(staged) => {
            diagnostics.summary.mode = Some(staged.mode);
            diagnostics.summary.grid_size = Some(staged.result.grid.size);
            diagnostics.summary.strategy = Some(staged.strategy);
            diagnostics.summary.brightness = Some(staged.brightness);
            progress(Stage::Done);
        }
        Err(e) => log::warn!("recognition failed: {e}"),
    }
    (result, diagnostics)
}
