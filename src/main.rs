use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lottie_core::{CompositionLayer, KeyPath, PlayerConfig};
use lottie_player::{export_frames, export_still, load_composition, ExportOptions};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the composition JSON
    #[arg(value_name = "COMPOSITION")]
    input: PathBuf,

    /// Directory for the PNG frames
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Player settings as JSON (frame rate, repeat, easing, speed)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the configured playback speed
    #[arg(long)]
    speed: Option<f32>,

    /// Output width in pixels
    #[arg(long)]
    width: Option<i32>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<i32>,

    /// Maximum number of frames to write
    #[arg(long, default_value_t = 600)]
    frames: usize,

    /// Write a single still at this progress instead of playing
    #[arg(long)]
    progress: Option<f32>,

    /// Print every addressable key path and exit
    #[arg(long)]
    list_keypaths: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_logging(level: LogLevel, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.to_string().parse()?)
        .from_env_lossy();

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let data = load_composition(&cli.input)?;

    if cli.list_keypaths {
        let composition = CompositionLayer::new(&data);
        for path in composition.resolve_key_path(&KeyPath::new(["**"])) {
            println!("{path}");
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PlayerConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PlayerConfig::default(),
    };
    if let Some(speed) = cli.speed {
        config.speed = speed;
    }

    let output = cli.out.unwrap_or_else(|| cli.input.with_extension("frames"));
    info!(input = %cli.input.display(), output = %output.display(), "exporting");

    let options = ExportOptions {
        width: cli.width,
        height: cli.height,
        config,
        max_frames: cli.frames,
    };
    if let Some(progress) = cli.progress {
        let path = export_still(&data, &options, progress, &output)?;
        info!(path = %path.display(), "still written");
        return Ok(());
    }
    let frames = export_frames(&data, &options, &output)?;
    info!(frames = frames.len(), "done");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level, cli.log_format) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = run(cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
