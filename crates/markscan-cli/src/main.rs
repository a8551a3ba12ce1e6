//! markscan: read shaded bubbles off a photographed order form.
//!
//! Thin front end over `markscan-pipeline`. Each subcommand loads one
//! image file, runs a pipeline entry point and prints either a
//! human-readable report or JSON:
//!
//! - `detect`: find and order the bubbles
//! - `analyze`: split bubbles into shaded and empty
//! - `scan`: full recognition into a priced order
//! - `bench`: timed scans with per-stage diagnostics
//! - `health`: version and default parameters
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin markscan -- scan [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod load;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use markscan_pipeline::diagnostics::{Clock, ScanDiagnostics};
use markscan_pipeline::{
    CircleOrderingKind, CircleReport, DetectionParameters, Menu, ScanConfig, ScanError,
    ScanResult, Scanner, ShadingReport,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::load::LoadError;

/// Optical mark recognition for paper order forms.
#[derive(Parser)]
#[command(name = "markscan", version)]
struct Cli {
    /// Raise log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and order the bubbles on a form.
    Detect(ImageArgs),
    /// Classify each bubble as shaded or empty.
    Analyze(ImageArgs),
    /// Read the form into a priced order.
    Scan(ImageArgs),
    /// Run timed scans and print per-stage diagnostics.
    Bench {
        #[command(flatten)]
        input: ImageArgs,

        /// Number of runs for averaging.
        #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        runs: usize,
    },
    /// Print version and default parameters.
    Health {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ImageArgs {
    /// Path to the form image (PNG, JPEG, GIF, BMP, TIFF, WebP).
    image_path: PathBuf,

    #[command(flatten)]
    settings: Settings,

    /// Output JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Also write the JSON result to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct Settings {
    /// Full scan configuration as a JSON file.
    ///
    /// When provided, all other scan parameter flags are ignored. The JSON
    /// must be a valid `ScanConfig` serialization.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalogs and prices as a JSON file (a `Menu` serialization).
    #[arg(long)]
    menu: Option<PathBuf>,

    /// Inverse accumulator resolution (1 = full resolution).
    #[arg(long, default_value_t = DetectionParameters::DEFAULT_RESOLUTION_RATIO)]
    resolution_ratio: f64,

    /// Minimum distance between detected centers, in pixels.
    #[arg(long, default_value_t = DetectionParameters::DEFAULT_MIN_CENTER_DISTANCE)]
    min_center_distance: f64,

    /// Upper edge-detector threshold.
    #[arg(long, default_value_t = DetectionParameters::DEFAULT_EDGE_THRESHOLD)]
    edge_threshold: f32,

    /// Votes a center needs to be accepted.
    #[arg(long, default_value_t = DetectionParameters::DEFAULT_ACCUMULATOR_THRESHOLD)]
    accumulator_threshold: u32,

    /// Smallest radius searched, in pixels.
    #[arg(long, default_value_t = DetectionParameters::DEFAULT_MIN_RADIUS)]
    min_radius: u32,

    /// Largest radius searched, in pixels.
    #[arg(long, default_value_t = DetectionParameters::DEFAULT_MAX_RADIUS)]
    max_radius: u32,

    /// Horizontal distance under which circles share a column, in pixels.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_COLUMN_TOLERANCE)]
    column_tolerance: u32,

    /// Skip form identification and map every bubble onto the flat list.
    #[arg(long)]
    flat: bool,

    /// Reading-order strategy (defaults to lexicographic with `--flat`).
    #[arg(long, value_enum)]
    ordering: Option<Ordering>,
}

/// Reading-order strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Ordering {
    /// Columns left to right, each read top to bottom.
    ColumnMajor,
    /// Plain sort by x, then y.
    Lexicographic,
}

impl From<Ordering> for CircleOrderingKind {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::ColumnMajor => Self::ColumnMajor,
            Ordering::Lexicographic => Self::Lexicographic,
        }
    }
}

/// Everything that can stop a subcommand.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, or by the
/// verbosity count when `RUST_LOG` is unset.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

const fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Detect(args) => {
            let (scanner, bytes) = prepare(&args)?;
            let report = scanner.detect_circles(&bytes)?;
            emit(&args, &report, render_circles)
        }
        Command::Analyze(args) => {
            let (scanner, bytes) = prepare(&args)?;
            let report = scanner.analyze_shading(&bytes)?;
            emit(&args, &report, render_shading)
        }
        Command::Scan(args) => {
            let (scanner, bytes) = prepare(&args)?;
            let result = scanner.scan(&bytes)?;
            emit(&args, &result, render_scan)
        }
        Command::Bench { input, runs } => bench(&input, runs),
        Command::Health { json } => {
            let report = HealthReport::new();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render_health(&report));
            }
            Ok(())
        }
    }
}

/// Build the scanner and read the image named by `args`.
fn prepare(args: &ImageArgs) -> Result<(Scanner, Vec<u8>), CliError> {
    let scanner = scanner_from_settings(&args.settings)?;
    let bytes = load::read_image(&args.image_path)?;
    eprintln!(
        "Image: {} ({} bytes)",
        args.image_path.display(),
        bytes.len(),
    );
    Ok((scanner, bytes))
}

/// Build a [`Scanner`] from CLI settings.
///
/// If `--config` is provided, the file is parsed directly and all
/// individual parameter flags are ignored. Otherwise a config is
/// assembled from the individual flags.
fn scanner_from_settings(settings: &Settings) -> Result<Scanner, CliError> {
    let config = match settings.config {
        Some(ref path) => load::read_json(path)?,
        None => config_from_flags(settings),
    };
    let menu = match settings.menu {
        Some(ref path) => load::read_json(path)?,
        None => Menu::default(),
    };
    tracing::debug!(?config, "scan configuration");
    Ok(Scanner::new(config, menu)?)
}

fn config_from_flags(settings: &Settings) -> ScanConfig {
    let base = if settings.flat {
        ScanConfig::flat()
    } else {
        ScanConfig::default()
    };
    ScanConfig {
        detection: DetectionParameters {
            resolution_ratio: settings.resolution_ratio,
            min_center_distance: settings.min_center_distance,
            edge_threshold: settings.edge_threshold,
            accumulator_threshold: settings.accumulator_threshold,
            min_radius: settings.min_radius,
            max_radius: settings.max_radius,
        },
        column_tolerance: settings.column_tolerance,
        ordering: settings.ordering.map_or(base.ordering, CircleOrderingKind::from),
        ..base
    }
}

/// Print `value` as JSON or through `render`, and save it to `--output`.
fn emit<T: Serialize>(
    args: &ImageArgs,
    value: &T,
    render: fn(&T) -> String,
) -> Result<(), CliError> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    if let Some(ref path) = args.output {
        write_json(path, value)?;
        eprintln!("Result written to {}", path.display());
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn render_circles(report: &CircleReport) -> String {
    let mut lines = vec![format!("Circles found: {}", report.circles_found)];
    lines.push(format!("{:>4} {:>6} {:>6} {:>6}", "ID", "X", "Y", "R"));
    for circle in &report.circles {
        lines.push(format!(
            "{:>4} {:>6} {:>6} {:>6}",
            circle.id, circle.center.x, circle.center.y, circle.radius,
        ));
    }
    lines.join("\n")
}

fn render_shading(report: &ShadingReport) -> String {
    let mut lines = vec![format!(
        "Circles: {}  |  Shaded: {}  |  Empty: {}",
        report.total_circles, report.shaded_circles, report.empty_circles,
    )];
    for circle in &report.shaded {
        lines.push(format!(
            "  shaded  ID {:>3} at ({}, {})  fill {:.1}%",
            circle.id, circle.center.x, circle.center.y, circle.fill_percentage,
        ));
    }
    lines.join("\n")
}

fn render_scan(result: &ScanResult) -> String {
    let mut lines = vec![
        result.form_label.clone(),
        format!(
            "Circles: {}  |  Menu circles: {}  |  Items: {}",
            result.total_circles,
            result.menu_circles,
            result.selected_items(),
        ),
        String::new(),
    ];

    if result.order_lines.is_empty() {
        lines.push("No items selected.".to_owned());
    } else {
        for line in &result.order_lines {
            lines.push(format!(
                "  {:<28} x{} {:>10}   (ID {}, fill {:.1}%, confidence {:.0})",
                line.label,
                line.quantity,
                line.unit_price.to_string(),
                line.circle_id,
                line.fill_percentage,
                line.confidence,
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!("Total: {}", result.total_price));
    lines.push(format!("Confidence: {:.1}", result.confidence_score));
    lines.push(String::new());
    lines.push("Circles:".to_owned());
    lines.extend(result.display_lines().into_iter().map(|l| format!("  {l}")));
    lines.join("\n")
}

/// Version and default parameters, for a liveness check.
#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
    form_a_items: usize,
    form_b_items: usize,
    config: ScanConfig,
}

impl HealthReport {
    fn new() -> Self {
        let menu = Menu::default();
        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            form_a_items: menu.form_a().len(),
            form_b_items: menu.form_b().len(),
            config: ScanConfig::default(),
        }
    }
}

fn render_health(report: &HealthReport) -> String {
    format!(
        "markscan {} ({})\nForm A: {} items  |  Form B: {} items\nDefaults: {:#?}",
        report.version, report.status, report.form_a_items, report.form_b_items, report.config,
    )
}

fn bench(input: &ImageArgs, runs: usize) -> Result<(), CliError> {
    let (scanner, bytes) = prepare(input)?;
    eprintln!("Config: {:#?}", scanner.config());
    eprintln!("Runs: {runs}");
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(runs);

    for run in 0..runs {
        if runs > 1 {
            eprintln!("--- Run {}/{runs} ---", run + 1);
        }

        let (result, diagnostics) =
            markscan_pipeline::diagnostics::scan_with_diagnostics(&scanner, &bytes, &StdClock)?;

        if input.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }

        // Save the result of the first run only.
        if run == 0
            && let Some(ref path) = input.output
        {
            write_json(path, &result)?;
            eprintln!("Result written to {}", path.display());
        }

        all_diagnostics.push(diagnostics);

        if runs > 1 {
            eprintln!();
        }
    }

    if runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
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
fn print_multi_run_summary(all_diagnostics: &[ScanDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );
    println!("{}", multi_run_summary(all_diagnostics));
}

/// Min/mean/max totals and per-stage means, in milliseconds.
#[allow(clippy::cast_precision_loss)]
fn multi_run_summary(all_diagnostics: &[ScanDiagnostics]) -> String {
    let Some(first) = all_diagnostics.first() else {
        return "Warning: no diagnostics to summarize".to_owned();
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    let mut lines = vec![
        format!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms"),
        String::new(),
        format!("{:<24} {:>12}", "Stage", "Mean (ms)"),
        "-".repeat(40),
    ];

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        lines.push(format!("{name:<24} {stage_mean:>10.3}ms"));
    }

    lines.join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn image_args(cli: Cli) -> ImageArgs {
        match cli.command {
            Command::Detect(args) | Command::Analyze(args) | Command::Scan(args) => args,
            Command::Bench { input, .. } => input,
            Command::Health { .. } => unreachable!("health takes no image"),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_library_defaults() {
        let args = image_args(parse(&["markscan", "scan", "form.png"]));
        assert_eq!(config_from_flags(&args.settings), ScanConfig::default());
        assert!(!args.json);
        assert!(args.output.is_none());
    }

    #[test]
    fn detection_flags_override_defaults() {
        let args = image_args(parse(&[
            "markscan",
            "detect",
            "form.png",
            "--min-radius",
            "12",
            "--max-radius",
            "40",
            "--accumulator-threshold",
            "25",
            "--column-tolerance",
            "60",
        ]));
        let config = config_from_flags(&args.settings);
        assert_eq!(config.detection.min_radius, 12);
        assert_eq!(config.detection.max_radius, 40);
        assert_eq!(config.detection.accumulator_threshold, 25);
        assert_eq!(config.column_tolerance, 60);
        assert_eq!(config.ordering, CircleOrderingKind::ColumnMajor);
    }

    #[test]
    fn flat_flag_selects_flat_mode_and_lexicographic_order() {
        let args = image_args(parse(&["markscan", "scan", "form.png", "--flat"]));
        let config = config_from_flags(&args.settings);
        assert_eq!(config.mode, markscan_pipeline::ScanMode::Flat);
        assert_eq!(config.ordering, CircleOrderingKind::Lexicographic);

        let args = image_args(parse(&[
            "markscan",
            "scan",
            "form.png",
            "--flat",
            "--ordering",
            "column-major",
        ]));
        let config = config_from_flags(&args.settings);
        assert_eq!(config.ordering, CircleOrderingKind::ColumnMajor);
    }

    #[test]
    fn bench_rejects_zero_runs() {
        assert!(Cli::try_parse_from(["markscan", "bench", "form.png", "--runs", "0"]).is_err());
        let cli = parse(&["markscan", "-vv", "bench", "form.png", "--runs", "3"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Bench { runs: 3, .. }));
    }

    #[test]
    fn log_level_follows_verbosity() {
        assert_eq!(default_log_level(0), "warn");
        assert_eq!(default_log_level(1), "debug");
        assert_eq!(default_log_level(5), "trace");
    }

    #[test]
    fn invalid_flags_fail_scanner_construction() {
        let args = image_args(parse(&[
            "markscan",
            "scan",
            "form.png",
            "--min-radius",
            "50",
            "--max-radius",
            "20",
        ]));
        let err = scanner_from_settings(&args.settings).unwrap_err();
        assert!(
            matches!(err, CliError::Scan(ScanError::InvalidConfig(_))),
            "got {err:?}"
        );
    }

    #[test]
    fn config_file_replaces_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ScanConfig {
            column_tolerance: 77,
            ..ScanConfig::flat()
        };
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let path_arg = path.to_str().unwrap();
        let args = image_args(parse(&[
            "markscan",
            "scan",
            "form.png",
            "--config",
            path_arg,
            "--column-tolerance",
            "5",
        ]));
        let scanner = scanner_from_settings(&args.settings).unwrap();
        assert_eq!(scanner.config(), &config);
    }

    #[test]
    fn scan_report_lists_total_and_display_log() {
        let image = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            40,
            30,
            image::Luma([250]),
        ));
        let result = Scanner::default().scan_image(&image);
        let text = render_scan(&result);
        assert!(text.starts_with("Unknown form - using full list"), "{text}");
        assert!(text.contains("No items selected."), "{text}");
        assert!(text.contains("Total: 0.00"), "{text}");
    }

    #[test]
    fn health_reports_catalog_sizes() {
        let report = HealthReport::new();
        assert_eq!(report.form_a_items, 41);
        assert_eq!(report.form_b_items, 38);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["config"]["detection"].is_object());
    }

    #[test]
    fn multi_run_summary_covers_every_stage() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(40, 30, image::Luma([250])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let scanner = Scanner::default();
        let runs: Vec<ScanDiagnostics> = (0..2)
            .map(|_| {
                markscan_pipeline::diagnostics::scan_with_diagnostics(&scanner, &bytes, &StdClock)
                    .unwrap()
                    .1
            })
            .collect();

        let summary = multi_run_summary(&runs);
        assert!(summary.starts_with("Total duration: min="), "{summary}");
        for (name, _) in runs[0].stages() {
            assert!(summary.contains(name), "missing stage {name}: {summary}");
        }
        assert_eq!(multi_run_summary(&[]), "Warning: no diagnostics to summarize");
    }

    #[test]
    fn write_json_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.json");
        let err = write_json(&path, &HealthReport::new()).unwrap_err();
        assert!(matches!(err, CliError::Write { .. }), "got {err:?}");
    }
}
