//! Command-line interface for the OTDR trace pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::core::loaders::{load_trace, DecoderRegistry};
use crate::core::trace::Trace;
use crate::core::writers::{self, ExportFormat};
use crate::processors::batch;
use crate::processors::classifier::{self, ClassificationMode};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "otdr-trace")]
#[command(about = "OTDR trace export and event classification", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a trace signal to CSV or TSV (chosen by output extension)
    Export {
        /// Input trace file
        input: PathBuf,
        /// Output .csv or .tsv file
        output: PathBuf,
        /// Baseline-correct against the first reading
        #[arg(long)]
        adjust: bool,
        /// Fixed number of decimal places
        #[arg(long)]
        precision: Option<usize>,
    },

    /// Locate a representative event peak in a trace
    Classify {
        /// Input trace file
        input: PathBuf,
        /// Event mode: E (edge) or C (continuous)
        #[arg(short, long)]
        mode: Option<String>,
        /// Lower bound of the distance window
        #[arg(long, requires = "max")]
        min: Option<f64>,
        /// Upper bound of the distance window
        #[arg(long, requires = "min")]
        max: Option<f64>,
        /// Minimum peak prominence
        #[arg(short, long)]
        prominence: Option<f64>,
        /// Minimum peak height
        #[arg(long)]
        height: Option<f64>,
        /// Baseline-correct against the first reading
        #[arg(long)]
        adjust: bool,
    },

    /// Show trace metadata and a signal summary
    Info {
        /// Input trace file
        input: PathBuf,
    },

    /// Export (and optionally classify) many trace files in parallel
    Batch {
        /// Input trace files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory for exported signals
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output format: csv or tsv
        #[arg(short, long)]
        format: Option<String>,
        /// Classify each trace with this mode (E or C)
        #[arg(short, long)]
        mode: Option<String>,
        /// Baseline-correct against the first reading
        #[arg(long)]
        adjust: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over a known number of files
fn create_progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos}/{len} files ({elapsed})")
    {
        pb.set_style(style);
    }
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let truncated: String = value.chars().take(36).collect();
            format!("{}...", truncated)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Log the error and exit with status 1
fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let registry = DecoderRegistry::with_defaults();

    // Dispatch to subcommands
    match cli.command {
        Commands::Export { input, output, adjust, precision } => {
            cmd_export(&input, &output, adjust, precision, &config, &registry);
        }
        Commands::Classify { input, mode, min, max, prominence, height, adjust } => {
            let range = min.zip(max);
            cmd_classify(&input, mode, range, prominence, height, adjust, &config, &registry);
        }
        Commands::Info { input } => {
            cmd_info(&input, &registry);
        }
        Commands::Batch { inputs, output_dir, format, mode, adjust } => {
            cmd_batch(&inputs, &output_dir, format, mode, adjust, &config, &registry);
        }
    }
}

fn load_or_exit(input: &PathBuf, registry: &DecoderRegistry) -> Trace {
    match load_trace(input, registry) {
        Ok(trace) => trace,
        Err(e) => fail(&format!("Failed to load {}", input.display()), e),
    }
}

fn cmd_export(
    input: &PathBuf,
    output: &PathBuf,
    adjust: bool,
    precision: Option<usize>,
    config: &PipelineConfig,
    registry: &DecoderRegistry,
) {
    let start = Instant::now();
    let adjust = adjust || config.extract.adjust;
    let precision = precision.or(config.export.precision);

    let spinner = create_spinner("Exporting signal...");

    let mut trace = load_or_exit(input, registry);
    trace.extract_axis(adjust);

    match writers::dump(output, &trace, precision) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Export Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output file", output.display().to_string()),
                    ("Samples", trace.len().to_string()),
                    ("Baseline offset", trace.baseline_offset().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            fail("Export failed", e);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_classify(
    input: &PathBuf,
    mode: Option<String>,
    range: Option<(f64, f64)>,
    prominence: Option<f64>,
    height: Option<f64>,
    adjust: bool,
    config: &PipelineConfig,
    registry: &DecoderRegistry,
) {
    let start = Instant::now();

    // Build classifier params with overrides
    let mut params = config.classifier.params();
    if let Some(tag) = mode {
        params.mode = match tag.parse::<ClassificationMode>() {
            Ok(m) => m,
            Err(e) => fail("Classification failed", e),
        };
    }
    if range.is_some() {
        params.x_range = range;
    }
    if let Some(p) = prominence {
        params.prominence = p;
    }
    if height.is_some() {
        params.height_threshold = height;
    }

    let mut trace = load_or_exit(input, registry);
    trace.extract_axis(adjust || config.extract.adjust);

    let event = match classifier::classify(trace.signal(), &params) {
        Ok(event) => event,
        Err(e) => fail("Classification failed", e),
    };

    let window = params
        .x_range
        .map(|(lo, hi)| format!("[{}, {}]", lo, hi))
        .unwrap_or_else(|| "full trace".to_string());

    let mut series = trace.series();
    if let Some(ev) = event {
        series = series.with_marker(format!("{} event", params.mode), ev.position);
    }

    let mut items = vec![
        ("Input file", input.display().to_string()),
        ("Mode", params.mode.to_string()),
        ("Window", window),
        ("Prominence", params.prominence.to_string()),
        (
            "Height threshold",
            params
                .height_threshold
                .map_or_else(|| "none".to_string(), |h| h.to_string()),
        ),
        (
            "Event",
            event.map_or_else(|| "no event found".to_string(), |ev| ev.to_string()),
        ),
    ];
    for marker in &series.markers {
        items.push(("Marker", format!("{} @ {}", marker.name, marker.position)));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Classification Complete", &items);
}

fn cmd_info(input: &PathBuf, registry: &DecoderRegistry) {
    let trace = load_or_exit(input, registry);
    let series = trace.series();

    let span = match (series.positions.first(), series.positions.last()) {
        (Some(first), Some(last)) => format!("{} .. {}", first, last),
        _ => "empty".to_string(),
    };
    let (lo, hi) = series
        .attenuations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let amplitude = if series.is_empty() {
        "empty".to_string()
    } else {
        format!("{} .. {}", lo, hi)
    };

    let mut items = vec![
        ("Input file", input.display().to_string()),
        ("Samples", trace.len().to_string()),
        ("Position span", span),
        ("Amplitude span", amplitude),
    ];
    for (label, value) in trace.metadata().entries() {
        items.push((label, value.to_string()));
    }

    print_summary("Trace Info", &items);
}

fn cmd_batch(
    inputs: &[PathBuf],
    output_dir: &PathBuf,
    format: Option<String>,
    mode: Option<String>,
    adjust: bool,
    config: &PipelineConfig,
    registry: &DecoderRegistry,
) {
    let start = Instant::now();

    if let Some(threads) = config.batch.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            warn!("Could not configure {} worker threads: {}", threads, e);
        }
    }

    let mut options = config.batch_options(mode.is_some());
    options.adjust = adjust || options.adjust;
    if let Some(fmt) = format {
        options.format = match fmt.parse::<ExportFormat>() {
            Ok(f) => f,
            Err(e) => fail("Batch failed", e),
        };
    }
    if let (Some(tag), Some(params)) = (mode, options.classifier.as_mut()) {
        params.mode = match tag.parse::<ClassificationMode>() {
            Ok(m) => m,
            Err(e) => fail("Batch failed", e),
        };
    }

    println!("Processing {} files...", inputs.len());
    println!("Output directory: {}", output_dir.display());

    let progress = create_progress(inputs.len());

    let report = match batch::process_batch_with(inputs, output_dir, &options, registry, |_| {
        progress.inc(1)
    }) {
        Ok(report) => report,
        Err(e) => {
            progress.finish_and_clear();
            fail("Batch failed", e);
        }
    };
    progress.finish_and_clear();

    for outcome in report.outcomes.iter().filter(|o| !o.is_ok()) {
        error!(
            "{}: {}",
            outcome.input.display(),
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut items = vec![
        ("Output directory", output_dir.display().to_string()),
        ("Format", options.format.extension().to_string()),
        ("Succeeded", report.succeeded().to_string()),
        ("Failed", report.failed().to_string()),
        ("Skipped", report.skipped.len().to_string()),
    ];
    if let Some(params) = &options.classifier {
        items.push(("Mode", params.mode.to_string()));
        items.push(("Events found", report.events_found().to_string()));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Batch Complete", &items);

    if report.failed() > 0 {
        std::process::exit(1);
    }
}
