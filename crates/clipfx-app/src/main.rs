//! ClipFx - retime and color-grade a video from the command line.

use anyhow::{Context as _, Result};
use clap::Parser;
use clipfx_core::{FilterOptions, MediaFile, ProgressCallback};
use clipfx_engine::{BackendMode, ProcessorConfig, VideoProcessor};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clipfx", version, about = "Change the speed and color of a video")]
struct Cli {
    /// Input video.
    input: PathBuf,

    /// Output MP4 path.
    #[arg(short, long)]
    output: PathBuf,

    /// Playback speed multiplier (2 = twice as fast).
    #[arg(long)]
    speed: Option<f32>,

    /// Contrast (1 = unchanged).
    #[arg(long)]
    contrast: Option<f32>,

    /// Saturation (0 = grayscale, 1 = unchanged).
    #[arg(long)]
    saturation: Option<f32>,

    /// Color temperature in [-1, 1]; positive is warmer.
    #[arg(long, allow_hyphen_values = true)]
    temperature: Option<f32>,

    /// Shadow lift (1 = unchanged).
    #[arg(long)]
    shadows: Option<f32>,

    /// Highlight gain (1 = unchanged).
    #[arg(long)]
    highlights: Option<f32>,

    /// Backend to use; overrides the config file and CLIPFX_MODE.
    #[arg(long)]
    mode: Option<BackendMode>,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grade on the CPU even when a GPU is available.
    #[arg(long, default_value_t = false)]
    no_gpu: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            speed: self.speed,
            contrast: self.contrast,
            saturation: self.saturation,
            temperature: self.temperature,
            shadows: self.shadows,
            highlights: self.highlights,
        }
    }

    fn processor_config(&self) -> Result<ProcessorConfig> {
        let mut config = match &self.config {
            Some(path) => ProcessorConfig::load(path)
                .with_context(|| format!("load config '{}'", path.display()))?,
            None => ProcessorConfig::default().with_env_overrides()?,
        };
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.no_gpu {
            config.use_gpu = false;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_line(label: &'static str) -> ProgressCallback {
    Arc::new(move |percent| {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{label}: {percent:5.1}%");
        if percent >= 100.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.processor_config()?;
    let options = cli.filter_options();
    // Reject bad parameters before loading anything.
    options.resolve()?;

    let input = MediaFile::read(&cli.input)
        .with_context(|| format!("read input '{}'", cli.input.display()))?;
    info!(input = %cli.input.display(), bytes = input.len(), mode = %config.mode, "ClipFx starting");

    let processor = VideoProcessor::new(config);
    processor
        .load(Some(progress_line("loading")))
        .await
        .context("load backend")?;

    let blob = processor
        .apply_filters(&input, options, Some(progress_line("processing")))
        .await
        .context("process video")?;
    processor.destroy().await;

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&cli.output, &blob.data)
        .with_context(|| format!("write output '{}'", cli.output.display()))?;
    info!(output = %cli.output.display(), bytes = blob.len(), "Done");
    Ok(())
}
