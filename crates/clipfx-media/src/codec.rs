//! Codec seams used by the frame pipeline.
//!
//! The frame-codec driver only talks to these traits, so tests can swap in instrumented
//! fakes. [`FfmpegCodecs`] is the production provider.

use crate::decoder::FfmpegDecoder;
use crate::encoder::{EncoderSettings, FfmpegEncoder};
use crate::{install, probe};
use async_trait::async_trait;
use clipfx_core::{ClipFxError, FrameBuffer, FrameRate, JobOutput, Result, SourceMedia};
use std::path::Path;
use std::sync::Arc;

/// A decoded source frame.
///
/// The handle is closed exactly once: [`DecodedFrame::close`] consumes it, and dropping an
/// unclosed handle closes it.
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// Presentation time in source seconds.
    pub timestamp: f64,
    data: Arc<[u8]>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl DecodedFrame {
    pub fn new(width: u32, height: u32, timestamp: f64, data: Arc<[u8]>) -> Self {
        Self {
            width,
            height,
            timestamp,
            data,
            on_close: None,
        }
    }

    /// Run `hook` when the handle is closed. Used by decoders that track open frames.
    pub fn with_close_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy the pixels into a reusable buffer of the same size.
    pub fn copy_into(&self, buffer: &mut FrameBuffer) -> Result<()> {
        if buffer.width != self.width || buffer.height != self.height {
            return Err(ClipFxError::Decoder(format!(
                "decoded frame is {}x{}, buffer is {}x{}",
                self.width, self.height, buffer.width, buffer.height
            )));
        }
        buffer.copy_from(&self.data)
    }

    /// Release the frame.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl Drop for DecodedFrame {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Pull-by-timestamp frame source.
#[async_trait]
pub trait FrameDecoder: Send {
    /// The frame nearest `t_src`, or `None` once `t_src` is at or past the end of the source.
    ///
    /// Requests must not go backwards.
    async fn frame_at(&mut self, t_src: f64) -> Result<Option<DecodedFrame>>;

    /// Stop decoding and release the underlying process or codec.
    async fn close(&mut self);
}

/// Sink for processed frames producing an MP4 stream.
#[async_trait]
pub trait FrameEncoder: Send {
    /// Queue one frame for output time `timestamp`. Timestamps strictly increase.
    async fn encode(&mut self, frame: &FrameBuffer, timestamp: f64) -> Result<()>;

    /// Flush, finalize the container and return everything written.
    async fn finish(self: Box<Self>) -> Result<JobOutput>;

    /// Discard partial output and release the encoder.
    async fn abort(self: Box<Self>);
}

/// Everything the frame-codec driver needs from the platform.
#[async_trait]
pub trait CodecProvider: Send + Sync {
    /// Check (or install) the codecs. Failures here are load-time errors.
    async fn load(&self) -> Result<()>;

    /// Describe the video at `path`.
    async fn probe(&self, path: &Path) -> Result<SourceMedia>;

    async fn open_decoder(&self, path: &Path, media: &SourceMedia) -> Result<Box<dyn FrameDecoder>>;

    async fn open_encoder(
        &self,
        width: u32,
        height: u32,
        rate: FrameRate,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn FrameEncoder>>;
}

/// ffmpeg-backed provider.
#[derive(Debug, Clone)]
pub struct FfmpegCodecs {
    pub auto_download: bool,
}

impl FfmpegCodecs {
    pub fn new(auto_download: bool) -> Self {
        Self { auto_download }
    }
}

impl Default for FfmpegCodecs {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl CodecProvider for FfmpegCodecs {
    async fn load(&self) -> Result<()> {
        install::ensure_ffmpeg(self.auto_download).await
    }

    async fn probe(&self, path: &Path) -> Result<SourceMedia> {
        probe::probe_file(path).await
    }

    async fn open_decoder(&self, path: &Path, media: &SourceMedia) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(FfmpegDecoder::open(path, media)?))
    }

    async fn open_encoder(
        &self,
        width: u32,
        height: u32,
        rate: FrameRate,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(FfmpegEncoder::spawn(width, height, rate, settings)?))
    }
}
