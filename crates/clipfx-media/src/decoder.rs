//! Video decoder using FFmpeg as a piped subprocess.
//!
//! ffmpeg decodes forward and writes raw RGBA frames to stdout, resampled to the probed rate
//! so frame `i` sits exactly at `i / rate` even for variable-rate sources. Requests are
//! served by reading ahead until the frame nearest the requested source time is found, so a
//! decoder only moves forward and never seeks.

use crate::codec::{DecodedFrame, FrameDecoder};
use crate::process::{describe_exit, ffmpeg_path, StderrTail};
use async_trait::async_trait;
use clipfx_core::{ClipFxError, FrameBuffer, FrameRate, RationalTime, Result, SourceMedia};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

type Frame = (f64, Arc<[u8]>);

/// ffmpeg arguments decoding `path` to raw RGBA on stdout at a constant `rate`.
pub fn decoder_args(path: &Path, rate: FrameRate) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-i"].map(OsString::from).into();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-an".to_string(),
            "-sn".to_string(),
            "-vf".to_string(),
            format!("fps={}", rate.as_ffmpeg_arg()),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "pipe:1".to_string(),
        ]
        .map(OsString::from),
    );
    args
}

/// Forward-only ffmpeg decoder serving frames by timestamp.
pub struct FfmpegDecoder {
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: StderrTail,
    width: u32,
    height: u32,
    rate: FrameRate,
    duration: f64,
    frame_bytes: usize,
    frames_read: u64,
    current: Option<Frame>,
    lookahead: Option<Frame>,
    eof: bool,
}

impl FfmpegDecoder {
    /// Start decoding `path`, whose stream was described by `media`.
    pub fn open(path: &Path, media: &SourceMedia) -> Result<Self> {
        info!("Opening video file: {}", path.display());
        let mut command = Command::new(ffmpeg_path());
        command.args(decoder_args(path, media.frame_rate));
        Self::spawn(command, media)
    }

    /// Run `command` as the decoder. It must write raw RGBA frames of `media`'s size to
    /// stdout at `media`'s rate.
    pub fn spawn(mut command: Command, media: &SourceMedia) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClipFxError::Decoder(format!("failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipFxError::Decoder("failed to open ffmpeg stdout".into()))?;
        let stderr = child.stderr.take().map(StderrTail::spawn).unwrap_or_default();

        Ok(Self {
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr,
            width: media.width,
            height: media.height,
            rate: media.frame_rate,
            duration: media.duration,
            frame_bytes: FrameBuffer::byte_len(media.width, media.height),
            frames_read: 0,
            current: None,
            lookahead: None,
            eof: false,
        })
    }

    /// Frames pulled from the pipe so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let mut data = vec![0u8; self.frame_bytes];
        match stdout.read_exact(&mut data).await {
            Ok(_) => {
                let timestamp = RationalTime::from_frames(self.frames_read as i64, self.rate).to_seconds_f64();
                self.frames_read += 1;
                Ok(Some((timestamp, Arc::from(data))))
            }
            // End of stream. A truncated trailing frame is dropped, and a process that died
            // part-way fails the read instead of leaving the last frame to be repeated.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.eof = true;
                self.stdout = None;
                self.check_exit().await?;
                Ok(None)
            }
            Err(e) => Err(ClipFxError::Decoder(format!("failed to read frame: {e}"))),
        }
    }

    /// Reap ffmpeg once its output has ended and fail on a non-zero exit.
    async fn check_exit(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .await
            .map_err(|e| ClipFxError::Decoder(format!("failed to wait for ffmpeg: {e}")))?;
        if status.success() {
            debug!(frames = self.frames_read, "decoder reached end of stream");
            Ok(())
        } else {
            self.stderr.drain().await;
            Err(ClipFxError::Decoder(describe_exit("ffmpeg decoder", status, &self.stderr)))
        }
    }
}

#[async_trait]
impl FrameDecoder for FfmpegDecoder {
    async fn frame_at(&mut self, t_src: f64) -> Result<Option<DecodedFrame>> {
        if !t_src.is_finite() || t_src >= self.duration {
            return Ok(None);
        }

        loop {
            if self.lookahead.is_none() && !self.eof {
                self.lookahead = self.read_frame().await?;
            }
            let Some(next_ts) = self.lookahead.as_ref().map(|(ts, _)| *ts) else {
                break;
            };
            if next_ts <= t_src {
                self.current = self.lookahead.take();
                continue;
            }
            let next_is_nearer = match &self.current {
                Some((current_ts, _)) => next_ts - t_src < t_src - current_ts,
                None => true,
            };
            if next_is_nearer {
                self.current = self.lookahead.take();
            }
            break;
        }

        if let Some((ts, data)) = &self.current {
            return Ok(Some(DecodedFrame::new(
                self.width,
                self.height,
                *ts,
                data.clone(),
            )));
        }
        self.check_exit().await?;
        Ok(None)
    }

    async fn close(&mut self) {
        self.stdout = None;
        self.current = None;
        self.lookahead = None;
        if let Some(mut child) = self.child.take() {
            // A process that already ended on its own is reported rather than killed.
            match child.try_wait() {
                Ok(Some(status)) if !status.success() => {
                    self.stderr.drain().await;
                    warn!("{}", describe_exit("ffmpeg decoder", status, &self.stderr));
                }
                Ok(Some(_)) => {}
                _ => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }
        debug!(frames = self.frames_read, "decoder closed");
    }
}
