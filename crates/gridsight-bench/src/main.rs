//! gridsight-bench: CLI tool for recognition experiments and diagnostics.
//!
//! Runs the recognition pipeline on a given image file with configurable
//! parameters, printing the recovered region map and detailed per-stage
//! diagnostics. Useful for:
//!
//! - Checking which background assumption and region strategy win
//! - Tuning the colour thresholds and the brightness sweep
//! - Measuring per-stage durations to identify bottlenecks
//! - Inspecting why an attempt was rejected
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin gridsight-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use gridsight_pipeline::diagnostics::{Clock, RecognitionDiagnostics};
use gridsight_pipeline::{BackgroundMode, Collaborators, Input, PipelineConfig, StagedResult};

/// Recognition experiments and diagnostics for gridsight.
///
/// Runs the recognition pipeline on a given image with configurable
/// parameters and prints the recovered regions plus per-stage timing.
#[derive(Parser)]
#[command(name = "gridsight-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Background assumption to try first.
    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    mode: Mode,

    /// Working resolution (max dimension in pixels after downsampling).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WORKING_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: u32,

    /// Downsample filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Colour distance above which the enhancer draws a wall.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BORDER_COLOR_DISTANCE)]
    border_distance: f64,

    /// Colour distance below which the enhancer draws a bridge.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CONNECT_COLOR_DISTANCE)]
    connect_distance: f64,

    /// First brightness offset of the sweep.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SWEEP_START)]
    sweep_start: u8,

    /// Largest brightness offset of the sweep.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SWEEP_MAX)]
    sweep_max: u8,

    /// Read ownership from the unsmoothed binarisation.
    #[arg(long)]
    no_reblur: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Background assumption selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Decide from the mean luminance.
    Auto,
    /// Light page first.
    Light,
    /// Dark page first.
    Dark,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`gridsight_pipeline::DownsampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: gridsight_pipeline::DownsampleFilter) -> Filter {
    match f {
        gridsight_pipeline::DownsampleFilter::Disabled => Filter::Disabled,
        gridsight_pipeline::DownsampleFilter::Nearest => Filter::Nearest,
        gridsight_pipeline::DownsampleFilter::Triangle => Filter::Triangle,
        gridsight_pipeline::DownsampleFilter::CatmullRom => Filter::CatmullRom,
        gridsight_pipeline::DownsampleFilter::Gaussian => Filter::Gaussian,
        gridsight_pipeline::DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        background: match cli.mode {
            Mode::Auto => None,
            Mode::Light => Some(BackgroundMode::Light),
            Mode::Dark => Some(BackgroundMode::Dark),
        },
        working_resolution: cli.working_resolution,
        downsample_filter: match cli.downsample_filter {
            Filter::Disabled => gridsight_pipeline::DownsampleFilter::Disabled,
            Filter::Nearest => gridsight_pipeline::DownsampleFilter::Nearest,
            Filter::Triangle => gridsight_pipeline::DownsampleFilter::Triangle,
            Filter::CatmullRom => gridsight_pipeline::DownsampleFilter::CatmullRom,
            Filter::Gaussian => gridsight_pipeline::DownsampleFilter::Gaussian,
            Filter::Lanczos3 => gridsight_pipeline::DownsampleFilter::Lanczos3,
        },
        border_color_distance: cli.border_distance,
        connect_color_distance: cli.connect_distance,
        sweep_start: cli.sweep_start,
        sweep_max: cli.sweep_max,
        reblur_ownership: !cli.no_reblur,
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut failed = false;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (result, diagnostics) = gridsight_pipeline::recognize_with_diagnostics(
            Input::Encoded(&image_bytes),
            &config,
            Collaborators::default(),
            &StdClock,
        );

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        match result {
            Ok(staged) => {
                if run == 0 && !cli.json {
                    println!();
                    print_regions(&staged);
                }
            }
            Err(e) => {
                eprintln!("Recognition error: {e}");
                failed = true;
            }
        }

        log::info!(
            "run {} finished in {:.3}ms after {} attempt(s)",
            run + 1,
            diagnostics.total_duration.as_secs_f64() * 1000.0,
            diagnostics.summary.attempt_count,
        );
        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Print the region of every cell as a matrix.
fn print_regions(staged: &StagedResult) {
    let grid = &staged.result.grid;
    println!(
        "Regions ({0}x{0}, {1} background, {2} strategy{3}):",
        grid.size,
        staged.mode,
        staged.strategy,
        if staged.inverted { ", inverted" } else { "" },
    );
    let width = grid.size.to_string().len();
    for row in staged.ownership.rows() {
        let cells: Vec<String> = row.iter().map(|id| format!("{id:>width$}")).collect();
        println!("  {}", cells.join(" "));
    }
    if let Some(stars) = grid.stars_per_region() {
        println!("Stars per region: {stars}");
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[RecognitionDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means, summed over attempts within a run.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let mut names: Vec<&'static str> = Vec::new();
    for diag in all_diagnostics {
        for stage in diag.attempts.iter().flat_map(|a| &a.stages) {
            let name = stage.metrics.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    for name in names {
        let per_run: Vec<f64> = all_diagnostics
            .iter()
            .map(|d| {
                d.attempts
                    .iter()
                    .flat_map(|a| &a.stages)
                    .filter(|s| s.metrics.name() == name)
                    .map(|s| s.duration.as_secs_f64() * 1000.0)
                    .sum()
            })
            .collect();
        let stage_mean = per_run.iter().sum::<f64>() / per_run.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
