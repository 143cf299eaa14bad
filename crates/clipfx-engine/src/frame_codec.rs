//! Frame-by-frame backend: decode, color, encode.
//!
//! Source frames are pulled by timestamp for each output frame of the remapped timeline,
//! copied into one reusable buffer, graded on the GPU (falling back to the CPU per frame)
//! and streamed into the encoder.

use crate::config::ProcessorConfig;
use crate::job::{phases, JobContext};
use clipfx_color::CpuProcessor;
use clipfx_core::{
    ClipFxError, ColorParams, FilterParams, FrameBuffer, FrameRate, MediaBlob, MediaFile, Result,
    SourceMedia, TimeRemap,
};
use clipfx_gpu::ColorRenderer;
use clipfx_media::{CodecProvider, FrameDecoder, FrameEncoder};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// The job's source written to disk for the decoder. Removed when dropped.
pub struct TempSource {
    file: NamedTempFile,
}

impl TempSource {
    pub async fn write(media: &MediaFile, dir: Option<&Path>) -> Result<Self> {
        let suffix = format!(".{}", media.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("clipfx-src-").suffix(&suffix);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }?;
        tokio::fs::write(file.path(), &media.data).await?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// How frames get graded for one job.
enum ColorPath {
    /// Neutral color params: frames pass through untouched.
    Skip,
    Gpu {
        renderer: ColorRenderer,
        graded: FrameBuffer,
        fallback: CpuProcessor,
    },
    Cpu(CpuProcessor),
}

impl ColorPath {
    /// Pick a path. Acquiring a GPU device blocks, so call this off the async workers.
    fn choose(color: &ColorParams, media: &SourceMedia, use_gpu: bool) -> Self {
        if color.is_neutral() {
            return Self::Skip;
        }
        if use_gpu {
            let mut renderer = ColorRenderer::new(media.width, media.height);
            if renderer.init() {
                return Self::Gpu {
                    renderer,
                    graded: FrameBuffer::new(media.width, media.height),
                    fallback: CpuProcessor::new(),
                };
            }
        }
        Self::Cpu(CpuProcessor::new())
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Skip => "none",
            Self::Gpu { .. } => "gpu",
            Self::Cpu(_) => "cpu",
        }
    }

    /// Grade `frame`. Returns true when the result sits in the GPU output buffer rather
    /// than in `frame` itself.
    fn apply(&mut self, frame: &mut FrameBuffer, color: &ColorParams) -> Result<bool> {
        match self {
            Self::Skip => Ok(false),
            Self::Gpu {
                renderer,
                graded,
                fallback,
            } => {
                if renderer.process_into(frame, color, graded) {
                    Ok(true)
                } else {
                    fallback.process(frame, color)?;
                    Ok(false)
                }
            }
            Self::Cpu(cpu) => {
                cpu.process(frame, color)?;
                Ok(false)
            }
        }
    }

    /// Frames that went through the CPU, including GPU fallbacks.
    fn cpu_frames(&self) -> u64 {
        match self {
            Self::Skip => 0,
            Self::Gpu { fallback, .. } => fallback.frames_processed(),
            Self::Cpu(cpu) => cpu.frames_processed(),
        }
    }

    fn release(&mut self) {
        if let Self::Gpu { renderer, .. } = self {
            renderer.destroy();
        }
    }
}

/// The color stage of the frame loop: the chosen path plus the frame buffer it works on.
///
/// GPU readback and the rayon pass both block, so grading hands the whole stage to the
/// blocking pool and gets it back when the frame is done.
struct Grader {
    path: ColorPath,
    params: ColorParams,
    frame: FrameBuffer,
    on_gpu: bool,
}

impl Grader {
    async fn prepare(params: ColorParams, media: SourceMedia, use_gpu: bool) -> Result<Self> {
        let frame = FrameBuffer::new(media.width, media.height);
        if params.is_neutral() {
            return Ok(Self::new(ColorPath::Skip, params, frame));
        }
        let path = tokio::task::spawn_blocking(move || ColorPath::choose(&params, &media, use_gpu))
            .await
            .map_err(|e| ClipFxError::Internal(format!("color setup task failed: {e}")))?;
        Ok(Self::new(path, params, frame))
    }

    fn new(path: ColorPath, params: ColorParams, frame: FrameBuffer) -> Self {
        Self {
            path,
            params,
            frame,
            on_gpu: false,
        }
    }

    /// Grade the current frame.
    async fn grade(mut self) -> Result<Self> {
        if matches!(self.path, ColorPath::Skip) {
            return Ok(self);
        }
        tokio::task::spawn_blocking(move || -> Result<Self> {
            self.on_gpu = self.path.apply(&mut self.frame, &self.params)?;
            Ok(self)
        })
        .await
        .map_err(|e| ClipFxError::Internal(format!("color task failed: {e}")))?
    }

    /// The graded frame.
    fn output(&self) -> &FrameBuffer {
        match &self.path {
            ColorPath::Gpu { graded, .. } if self.on_gpu => graded,
            _ => &self.frame,
        }
    }
}

impl Drop for Grader {
    fn drop(&mut self) {
        self.path.release();
    }
}

/// Counts from a completed frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub expected: u64,
    /// Frames graded on the CPU, GPU fallbacks included.
    pub cpu_frames: u64,
}

/// Backend that retimes and grades frame by frame.
pub struct FrameCodecDriver {
    codecs: Arc<dyn CodecProvider>,
    config: ProcessorConfig,
}

impl FrameCodecDriver {
    pub fn new(codecs: Arc<dyn CodecProvider>, config: ProcessorConfig) -> Self {
        Self { codecs, config }
    }

    pub async fn load(&self) -> Result<()> {
        self.codecs.load().await?;
        info!("Frame-codec backend loaded");
        Ok(())
    }

    /// Nothing outlives a job here; every call owns its own decoder, encoder and renderer.
    pub async fn teardown(&self) {
        debug!("Frame-codec backend torn down");
    }

    /// Run one job.
    pub async fn run(&self, file: &MediaFile, params: &FilterParams, job: &JobContext) -> Result<MediaBlob> {
        params.color.validate()?;
        let remap = params.time_remap()?;
        if params.is_identity() {
            debug!("identity parameters, returning input unchanged");
            job.complete();
            return Ok(MediaBlob::copy_of(file));
        }

        let source = TempSource::write(file, self.config.scratch_dir.as_deref()).await?;
        job.report_phase(phases::PROBE, 0.0);
        let media = self.codecs.probe(source.path()).await?;
        if media.width == 0 || media.height == 0 || media.duration.is_nan() || media.duration <= 0.0 {
            return Err(ClipFxError::Probe(format!(
                "unusable source: {}x{}, {}s",
                media.width, media.height, media.duration
            )));
        }
        job.report_phase(phases::PROBE, 1.0);
        job.ensure_current("decode")?;

        let rate = self.config.output_frame_rate.unwrap_or(media.frame_rate);
        info!(
            width = media.width,
            height = media.height,
            duration = media.duration,
            speed = params.speed,
            fps = %rate,
            "Frame-codec job started"
        );

        let mut decoder = self.codecs.open_decoder(source.path(), &media).await?;
        let mut encoder = match self
            .codecs
            .open_encoder(media.width, media.height, rate, &self.config.encoder)
            .await
        {
            Ok(encoder) => encoder,
            Err(e) => {
                decoder.close().await;
                return Err(e);
            }
        };

        let looped = match Grader::prepare(params.color, media, self.config.use_gpu).await {
            Ok(grader) => {
                debug!(path = grader.path.name(), "color path selected");
                self.process_frames(decoder.as_mut(), encoder.as_mut(), grader, &media, remap, rate, job)
                    .await
            }
            Err(e) => Err(e),
        };
        decoder.close().await;

        let stats = match looped {
            Ok(stats) => stats,
            Err(e) => {
                encoder.abort().await;
                warn!("Frame-codec job failed: {e}");
                return Err(e);
            }
        };

        job.report_phase(phases::ENCODE, 0.0);
        let output = encoder.finish().await?;
        job.report_phase(phases::ENCODE, 1.0);
        job.ensure_current("finalize")?;

        info!(
            frames = stats.frames,
            expected = stats.expected,
            cpu_frames = stats.cpu_frames,
            bytes = output.total_len(),
            "Frame-codec job finished"
        );
        job.complete();
        Ok(MediaBlob::mp4(output.into_bytes()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_frames(
        &self,
        decoder: &mut dyn FrameDecoder,
        encoder: &mut dyn FrameEncoder,
        mut grader: Grader,
        media: &SourceMedia,
        remap: TimeRemap,
        rate: FrameRate,
        job: &JobContext,
    ) -> Result<FrameStats> {
        let expected = remap.expected_frame_count(media.duration, rate).max(1);
        let progress_every = u64::from(self.config.progress_interval.max(1));
        let yield_every = u64::from(self.config.yield_interval.max(1));
        let mut frames = 0u64;

        for out in remap.output_frames(media.duration, rate) {
            job.ensure_current("decode")?;

            let Some(decoded) = decoder.frame_at(out.source_time).await? else {
                debug!(t_src = out.source_time, "source ended early");
                break;
            };
            let copied = decoded.copy_into(&mut grader.frame);
            decoded.close();
            copied?;

            grader = grader.grade().await?;
            encoder.encode(grader.output(), out.output_time).await?;
            frames += 1;

            if frames % progress_every == 0 {
                job.report_phase(phases::PROCESS, frames as f64 / expected as f64);
            }
            if frames % yield_every == 0 {
                tokio::task::yield_now().await;
            }
        }

        if frames == 0 {
            return Err(ClipFxError::Decoder("source produced no frames".into()));
        }
        job.report_phase(phases::PROCESS, 1.0);
        Ok(FrameStats {
            frames,
            expected,
            cpu_frames: grader.path.cpu_frames(),
        })
    }
}

impl std::fmt::Debug for FrameCodecDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodecDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
