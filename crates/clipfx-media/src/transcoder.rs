//! Whole-file transcoder over a private scratch filesystem.
//!
//! Files are addressed by bare names inside the transcoder's scratch directory, which is
//! created on load and removed on terminate. One ffmpeg run applies the job's filter graph
//! and re-encodes to H.264 MP4 without audio.

use crate::encoder::EncoderSettings;
use crate::install;
use async_trait::async_trait;
use clipfx_core::{ClipFxError, ProgressCallback, Result};
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// Errors kept from an ffmpeg run for the failure message.
const MAX_ERROR_LINES: usize = 8;

/// One transcode: scratch input name in, scratch output name out.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub input: String,
    pub output: String,
    /// `-vf` argument; `None` re-encodes unfiltered.
    pub filter_graph: Option<String>,
    pub encoder: EncoderSettings,
    /// Output duration in seconds, used to turn ffmpeg's clock into a fraction.
    pub expected_duration: Option<f64>,
    /// Playback speed. Scales the input duration ffmpeg reports when no expected
    /// duration is given.
    pub speed: f64,
}

impl TranscodeJob {
    /// ffmpeg arguments with scratch names resolved under `root`.
    pub fn args(&self, root: &Path) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            root.join(&self.input).to_string_lossy().into_owned(),
        ];
        if let Some(graph) = &self.filter_graph {
            args.push("-vf".into());
            args.push(graph.clone());
        }
        args.extend(self.encoder.codec_args());
        args.push(root.join(&self.output).to_string_lossy().into_owned());
        args
    }
}

/// The transcoder backend's view of the platform.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// One-time setup. Failures here are load-time errors.
    async fn load(&self) -> Result<()>;

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    async fn delete_file(&self, name: &str) -> Result<()>;

    /// Run the job, reporting its progress as a fraction in `[0, 1]`.
    async fn exec(&self, job: &TranscodeJob, on_progress: ProgressCallback) -> Result<()>;

    /// Release the scratch filesystem. Later calls fail until the next load.
    async fn terminate(&self);
}

/// Parse ffmpeg's `HH:MM:SS.xx` progress clock into seconds.
pub fn parse_clock(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.starts_with('-') {
        return Some(0.0);
    }
    let mut parts = text.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Scratch names are single path components of `[A-Za-z0-9._-]` not starting with a dot.
pub fn is_scratch_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// ffmpeg-sidecar transcoder using a temporary directory as its filesystem.
#[derive(Debug)]
pub struct FfmpegTranscoder {
    base_dir: Option<PathBuf>,
    auto_download: bool,
    scratch: Mutex<Option<Arc<TempDir>>>,
}

impl FfmpegTranscoder {
    /// `base_dir` is where the scratch directory is created (system temp when `None`).
    pub fn new(base_dir: Option<PathBuf>, auto_download: bool) -> Self {
        Self {
            base_dir,
            auto_download,
            scratch: Mutex::new(None),
        }
    }

    /// Root of the scratch filesystem while loaded.
    pub fn scratch_root(&self) -> Option<PathBuf> {
        self.scratch.lock().as_ref().map(|dir| dir.path().to_path_buf())
    }

    fn root(&self) -> Result<Arc<TempDir>> {
        self.scratch.lock().clone().ok_or(ClipFxError::NotLoaded)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !is_scratch_name(name) {
            return Err(ClipFxError::InvalidParameter(format!("bad scratch file name {name:?}")));
        }
        Ok(self.root()?.path().join(name))
    }
}

fn run_ffmpeg(
    args: Vec<String>,
    expected_duration: Option<f64>,
    speed: f64,
    on_progress: ProgressCallback,
) -> Result<()> {
    let mut child = FfmpegCommand::new()
        .args(&args)
        .spawn()
        .map_err(|e| ClipFxError::transcode("exec", format!("failed to start ffmpeg: {e}")))?;
    let events = child
        .iter()
        .map_err(|e| ClipFxError::transcode("exec", e.to_string()))?;

    let mut duration = expected_duration.filter(|d| *d > 0.0);
    let mut errors: Vec<String> = Vec::new();
    for event in events {
        match event {
            FfmpegEvent::ParsedDuration(parsed) if duration.is_none() && parsed.duration > 0.0 => {
                duration = Some(parsed.duration / speed);
            }
            FfmpegEvent::Progress(progress) => {
                if let (Some(total), Some(elapsed)) = (duration, parse_clock(&progress.time)) {
                    on_progress((elapsed / total).clamp(0.0, 1.0) as f32);
                }
            }
            FfmpegEvent::Error(message) | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                if errors.len() < MAX_ERROR_LINES {
                    errors.push(message);
                }
            }
            _ => {}
        }
    }

    let status = child
        .wait()
        .map_err(|e| ClipFxError::transcode("exec", format!("failed to wait for ffmpeg: {e}")))?;
    if !status.success() {
        let detail = if errors.is_empty() {
            format!("ffmpeg exited with {status}")
        } else {
            errors.join("; ")
        };
        return Err(ClipFxError::transcode("exec", detail));
    }
    Ok(())
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn load(&self) -> Result<()> {
        if self.scratch.lock().is_some() {
            return Ok(());
        }
        install::ensure_ffmpeg(self.auto_download).await?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("clipfx-");
        let dir = match &self.base_dir {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }
        .map_err(|e| ClipFxError::BackendUnavailable(format!("cannot create scratch directory: {e}")))?;

        info!("Transcoder scratch directory: {}", dir.path().display());
        *self.scratch.lock() = Some(Arc::new(dir));
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ClipFxError::transcode("write input", format!("{name}: {e}")))
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ClipFxError::transcode("read output", format!("{name}: {e}")))
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn exec(&self, job: &TranscodeJob, on_progress: ProgressCallback) -> Result<()> {
        for name in [&job.input, &job.output] {
            if !is_scratch_name(name) {
                return Err(ClipFxError::InvalidParameter(format!("bad scratch file name {name:?}")));
            }
        }
        job.encoder.validate()?;
        let root = self.root()?;
        let args = job.args(root.path());
        debug!(?args, "running transcode");

        let expected = job.expected_duration;
        let speed = if job.speed > 0.0 { job.speed } else { 1.0 };
        tokio::task::spawn_blocking(move || {
            // Keeps the scratch directory alive for the length of the run.
            let _root = root;
            run_ffmpeg(args, expected, speed, on_progress)
        })
        .await
        .map_err(|e| ClipFxError::transcode("exec", format!("transcode task failed: {e}")))?
    }

    async fn terminate(&self) {
        let dir = self.scratch.lock().take();
        if let Some(dir) = dir {
            debug!("Releasing scratch directory {}", dir.path().display());
        }
    }
}
