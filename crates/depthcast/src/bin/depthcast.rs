//! depthcast CLI: live pipeline, one-shot segmentation and calibration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use depthcast::oneshot::{calibrate_file, segment_file};
use depthcast::pipeline::{
    FixedSource, HeadlessDisplay, JsonFileSource, Pipeline, RenderMode, ReplayCamera, Settings,
    SettingsSource,
};
use depthcast::segment::TraversalMode;
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliError = Box<dyn Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "depthcast")]
#[command(about = "Segment depth frames and project content onto the found objects")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON log lines (only with the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live pipeline on recorded depth frames.
    Run(RunArgs),

    /// Segment one depth PNG and write the masks plus a JSON report.
    Segment(SegmentArgs),

    /// Calibrate from one intensity PNG and write the homography and ROI mask.
    Calibrate(CalibrateArgs),

    /// Write the default settings as JSON.
    InitConfig {
        /// Destination file.
        #[arg(long)]
        out: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Settings JSON; reloaded from disk when `l` is pressed.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Depth PNG or directory of depth PNGs, played in a loop.
    #[arg(long)]
    replay: PathBuf,

    /// Intensity PNG used for calibration (defaults to the depth frames).
    #[arg(long)]
    intensity: Option<PathBuf>,

    /// Initial render mode.
    #[arg(long, value_enum, default_value_t = ModeArg::Blank)]
    mode: ModeArg,

    /// Write the projected frame to this PNG.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Write the preview every N frames.
    #[arg(long, default_value = "30")]
    preview_every: u64,

    /// Print the run summary as JSON to this file instead of stdout.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct SegmentArgs {
    /// 8-bit depth PNG.
    #[arg(long)]
    input: PathBuf,

    /// Output directory for masks and the report.
    #[arg(long)]
    out: PathBuf,

    /// Settings JSON providing the segmentation defaults and preprocessing.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    z_limit: Option<u8>,

    #[arg(long)]
    min_distance: Option<u8>,

    #[arg(long)]
    medium_limit: Option<u8>,

    #[arg(long)]
    min_area: Option<usize>,

    #[arg(long)]
    max_objects: Option<usize>,

    /// Use the full recursive flood instead of the directed work list.
    #[arg(long, conflicts_with = "directed")]
    recurse: bool,

    /// Use the directed work-list flood.
    #[arg(long)]
    directed: bool,
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// Intensity PNG captured while the projector shows a white frame.
    #[arg(long)]
    input: PathBuf,

    /// Output directory for the homography and ROI mask.
    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    projector_width: Option<usize>,

    #[arg(long)]
    projector_height: Option<usize>,

    /// Smallest accepted target area in pixels.
    #[arg(long)]
    min_target_area: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Blank,
    Solid,
    TestPattern,
    Depth,
    Regions,
    Patterns,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Blank => RenderMode::Blank,
            ModeArg::Solid => RenderMode::Solid,
            ModeArg::TestPattern => RenderMode::TestPattern,
            ModeArg::Depth => RenderMode::Depth,
            ModeArg::Regions => RenderMode::Regions,
            ModeArg::Patterns => RenderMode::Patterns,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    init_logging(cli.verbose, cli.json_logs)?;

    match cli.command {
        Commands::Run(args) => run_pipeline(&args),
        Commands::Segment(args) => run_segment(&args),
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::InitConfig { out, force } => run_init_config(&out, force),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8, json: bool) -> CliResult<()> {
    // Level filtering happens in the subscriber (RUST_LOG).
    tracing_log::LogTracer::init()?;
    depthcast::core::init_tracing(json);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, _json: bool) -> CliResult<()> {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    depthcast::core::init_with_level(level)?;
    Ok(())
}

fn load_settings(config: Option<&Path>) -> CliResult<Settings> {
    Ok(match config {
        Some(path) => Settings::load_json(path)?,
        None => Settings::default(),
    })
}

fn run_pipeline(args: &RunArgs) -> CliResult<()> {
    let settings = load_settings(args.config.as_deref())?;
    let source: Box<dyn SettingsSource> = match &args.config {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => Box::new(FixedSource::new(settings.clone())),
    };

    let mut camera = ReplayCamera::new(&args.replay)?;
    if let Some(path) = &args.intensity {
        camera = camera.with_intensity(path);
    }
    let mut display = HeadlessDisplay::stdin()?;
    if let Some(path) = &args.preview {
        display = display.with_preview(path, args.preview_every);
    }

    let pipeline = Pipeline::new(settings, source, Box::new(camera), Box::new(display))?
        .with_mode(args.mode.into());
    let handle = pipeline.handle();
    ctrlc::set_handler(move || handle.stop())?;
    info!("keys: q quit, p pause, space step, c calibrate, m/0-5 mode, l reload, r restart");

    let summary = pipeline.run()?;
    let json = serde_json::to_string_pretty(&summary)?;
    match &args.summary {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn run_segment(args: &SegmentArgs) -> CliResult<()> {
    let settings = load_settings(args.config.as_deref())?;
    let mut params = settings.segmentation;
    if let Some(v) = args.z_limit {
        params.z_limit = v;
    }
    if let Some(v) = args.min_distance {
        params.min_distance = v;
    }
    if let Some(v) = args.medium_limit {
        params.medium_limit = v;
    }
    if let Some(v) = args.min_area {
        params.min_area = v;
    }
    if let Some(v) = args.max_objects {
        params.max_objects = v;
    }
    if args.recurse {
        params.traversal = TraversalMode::Recursive;
    } else if args.directed {
        params.traversal = TraversalMode::IterativeDirected;
    }

    let report = segment_file(&args.input, &params, &settings.preprocessing, &args.out)?;
    println!(
        "{} regions ({} undersized, {} dropped), report in {}",
        report.regions.len(),
        report.regions.undersized,
        report.regions.dropped,
        args.out.display()
    );
    Ok(())
}

fn run_calibrate(args: &CalibrateArgs) -> CliResult<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(w) = args.projector_width {
        settings.projector.width = w;
    }
    if let Some(h) = args.projector_height {
        settings.projector.height = h;
    }
    if let Some(area) = args.min_target_area {
        settings.calibration.target.min_area = area;
    }
    settings.validate()?;

    let report = calibrate_file(&args.input, &settings, &args.out)?;
    println!(
        "calibrated: target area {} px, corners TL {:?} BR {:?}",
        report.target_area,
        report.corners.top_left(),
        report.corners.bottom_right()
    );
    Ok(())
}

fn run_init_config(out: &Path, force: bool) -> CliResult<()> {
    if out.exists() && !force {
        return Err(format!("{} exists, pass --force to overwrite", out.display()).into());
    }
    Settings::default().write_json(out)?;
    println!("wrote {}", out.display());
    Ok(())
}
