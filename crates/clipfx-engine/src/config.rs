//! Processor configuration.
//!
//! Read from JSON (every field optional) and then overridden from the environment.

use clipfx_core::{ClipFxError, FrameRate, Result};
use clipfx_media::EncoderSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable selecting the backend.
pub const MODE_ENV: &str = "CLIPFX_MODE";

/// Which backend processes jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendMode {
    /// Whole-file ffmpeg run driven by one filter graph.
    Transcoder,
    /// Frame-by-frame decode, color pass and encode.
    #[default]
    FrameCodec,
}

impl BackendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcoder => "transcoder",
            Self::FrameCodec => "frame-codec",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = ClipFxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transcoder" | "ffmpeg" => Ok(Self::Transcoder),
            "frame-codec" | "framecodec" | "frame_codec" => Ok(Self::FrameCodec),
            other => Err(ClipFxError::Config(format!(
                "unknown backend mode {other:?} (expected transcoder or frame-codec)"
            ))),
        }
    }
}

/// Settings for a [`crate::VideoProcessor`] and its backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub mode: BackendMode,
    pub encoder: EncoderSettings,
    /// Output frame rate; the source rate when unset.
    pub output_frame_rate: Option<FrameRate>,
    /// Frames between explicit yields to the runtime.
    pub yield_interval: u32,
    /// Frames between progress reports.
    pub progress_interval: u32,
    /// Download ffmpeg on load when it isn't installed.
    pub auto_download_ffmpeg: bool,
    /// Parent directory for scratch files (system temp when unset).
    pub scratch_dir: Option<PathBuf>,
    /// Try the GPU color pass before falling back to the CPU.
    pub use_gpu: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::default(),
            encoder: EncoderSettings::default(),
            output_frame_rate: None,
            yield_interval: clipfx_core::pacing::YIELD_INTERVAL,
            progress_interval: clipfx_core::pacing::PROGRESS_INTERVAL,
            auto_download_ffmpeg: true,
            scratch_dir: None,
            use_gpu: true,
        }
    }
}

impl ProcessorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ClipFxError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)?.with_env_overrides()
    }

    /// Apply `CLIPFX_MODE` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(mode) = lookup(MODE_ENV).filter(|v| !v.trim().is_empty()) {
            self.mode = mode.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.yield_interval == 0 {
            return Err(ClipFxError::Config("yield_interval must be at least 1".into()));
        }
        if self.progress_interval == 0 {
            return Err(ClipFxError::Config("progress_interval must be at least 1".into()));
        }
        if let Some(rate) = self.output_frame_rate {
            if rate.numerator == 0 || rate.denominator == 0 {
                return Err(ClipFxError::Config(format!("invalid output frame rate {rate:?}")));
            }
        }
        self.encoder
            .validate()
            .map_err(|e| ClipFxError::Config(e.to_string()))
    }
}
