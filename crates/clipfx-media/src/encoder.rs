//! H.264 encoder streaming fragmented MP4 from an ffmpeg subprocess.
//!
//! Raw RGBA frames go in on stdin at a constant rate; the muxed stream comes back on stdout
//! and is collected chunk by chunk while encoding is still running.

use crate::codec::FrameEncoder;
use crate::process::{describe_exit, ffmpeg_path, StderrTail};
use async_trait::async_trait;
use clipfx_core::{ClipFxError, FrameBuffer, FrameRate, JobOutput, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Size of each read from the encoder's stdout.
const CHUNK_SIZE: usize = 64 * 1024;

/// Fragmented MP4 can be written to a pipe: no seek back to patch the header.
pub const FRAGMENTED_MOVFLAGS: &str = "+frag_keyframe+empty_moov+default_base_moof";

/// x264 settings shared by both backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// CRF quality (0-51, lower = better).
    pub crf: u8,
    /// x264 preset (ultrafast .. veryslow).
    pub preset: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "veryfast".to_string(),
        }
    }
}

impl EncoderSettings {
    /// `-c:v libx264 -preset .. -crf .. -pix_fmt yuv420p -an`.
    pub fn codec_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-an".into(),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if self.crf > 51 {
            return Err(ClipFxError::InvalidParameter(format!(
                "crf must be in 0..=51, got {}",
                self.crf
            )));
        }
        if self.preset.is_empty() || !self.preset.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ClipFxError::InvalidParameter(format!(
                "invalid x264 preset {:?}",
                self.preset
            )));
        }
        Ok(())
    }
}

/// Build the ffmpeg arguments for raw RGBA in, fragmented MP4 out on stdout.
pub fn encoder_args(width: u32, height: u32, rate: FrameRate, settings: &EncoderSettings) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-v".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "rgba".into(),
        "-video_size".into(),
        format!("{width}x{height}"),
        "-framerate".into(),
        rate.as_ffmpeg_arg(),
        "-i".into(),
        "pipe:0".into(),
    ];
    args.extend(settings.codec_args());
    args.extend([
        "-movflags".into(),
        FRAGMENTED_MOVFLAGS.into(),
        "-f".into(),
        "mp4".into(),
        "pipe:1".into(),
    ]);
    args
}

/// Running ffmpeg encoder.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: JoinHandle<std::io::Result<JobOutput>>,
    stderr: StderrTail,
    width: u32,
    height: u32,
    frames: u64,
    last_timestamp: Option<f64>,
}

impl FfmpegEncoder {
    pub fn spawn(width: u32, height: u32, rate: FrameRate, settings: &EncoderSettings) -> Result<Self> {
        settings.validate()?;
        let mut command = Command::new(ffmpeg_path());
        command.args(encoder_args(width, height, rate, settings));
        let encoder = Self::start(command, width, height)?;
        info!(width, height, fps = %rate, preset = %settings.preset, "encoder started");
        Ok(encoder)
    }

    /// Run `command` as the encoder. It reads raw RGBA frames of `width x height` on stdin
    /// and writes the container to stdout.
    pub fn start(mut command: Command, width: u32, height: u32) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClipFxError::Encoder(format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClipFxError::Encoder("failed to open ffmpeg stdin".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipFxError::Encoder("failed to open ffmpeg stdout".into()))?;
        let stderr = child.stderr.take().map(StderrTail::spawn).unwrap_or_default();

        let reader = tokio::spawn(async move {
            let mut output = JobOutput::new();
            loop {
                let mut chunk = vec![0u8; CHUNK_SIZE];
                let n = stdout.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(output);
                }
                chunk.truncate(n);
                output.push(chunk);
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            reader,
            stderr,
            width,
            height,
            frames: 0,
            last_timestamp: None,
        })
    }
}

#[async_trait]
impl FrameEncoder for FfmpegEncoder {
    async fn encode(&mut self, frame: &FrameBuffer, timestamp: f64) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ClipFxError::Encoder(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        if self.last_timestamp.is_some_and(|last| timestamp <= last) {
            return Err(ClipFxError::Encoder(format!(
                "timestamp {timestamp} does not advance past {:?}",
                self.last_timestamp
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClipFxError::Encoder("encoder already finished".into()))?;
        stdin
            .write_all(&frame.data)
            .await
            .map_err(|e| ClipFxError::Encoder(format!("failed to write frame: {e}")))?;
        self.frames += 1;
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<JobOutput> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| ClipFxError::Encoder(format!("failed to close ffmpeg stdin: {e}")))?;
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ClipFxError::Encoder(format!("failed to wait for ffmpeg: {e}")))?;
        let output = (&mut self.reader)
            .await
            .map_err(|e| ClipFxError::Encoder(format!("output reader failed: {e}")))?
            .map_err(|e| ClipFxError::Encoder(format!("failed to read ffmpeg output: {e}")))?;

        if !status.success() {
            self.stderr.drain().await;
            return Err(ClipFxError::Encoder(describe_exit("ffmpeg encoder", status, &self.stderr)));
        }
        debug!(frames = self.frames, bytes = output.total_len(), chunks = output.chunk_count(), "encoder finished");
        Ok(output)
    }

    async fn abort(mut self: Box<Self>) {
        self.stdin = None;
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        self.reader.abort();
        debug!(frames = self.frames, "encoder aborted");
    }
}
