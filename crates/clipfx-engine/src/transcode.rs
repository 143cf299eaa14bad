//! Whole-file backend: one external transcode per job.
//!
//! The color stage and the retime are expressed as a single ffmpeg filter graph, so the
//! transcoder never hands frames back to us.

use crate::config::ProcessorConfig;
use crate::job::{phases, JobContext};
use clipfx_color::build_filter_graph;
use clipfx_core::{ClipFxError, FilterParams, MediaBlob, MediaFile, Result};
use clipfx_media::{TranscodeJob, Transcoder};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A file in the transcoder's scratch filesystem, deleted when the job is done with it.
///
/// Call [`ScratchFile::remove`] on every exit path; a file dropped without it is removed
/// from a background task when a runtime is available.
pub struct ScratchFile {
    transcoder: Arc<dyn Transcoder>,
    name: String,
    removed: bool,
}

impl ScratchFile {
    pub fn new(transcoder: Arc<dyn Transcoder>, name: String) -> Self {
        Self {
            transcoder,
            name,
            removed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Best-effort delete. Failures are only logged.
    pub async fn remove(mut self) {
        self.removed = true;
        if let Err(e) = self.transcoder.delete_file(&self.name).await {
            warn!("Failed to delete scratch file {}: {e}", self.name);
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let transcoder = self.transcoder.clone();
            let name = std::mem::take(&mut self.name);
            handle.spawn(async move {
                if let Err(e) = transcoder.delete_file(&name).await {
                    warn!("Failed to delete scratch file {name}: {e}");
                }
            });
        }
    }
}

/// Backend driving an external [`Transcoder`].
pub struct TranscoderDriver {
    transcoder: Arc<dyn Transcoder>,
    config: ProcessorConfig,
    loaded: OnceCell<()>,
}

impl TranscoderDriver {
    pub fn new(transcoder: Arc<dyn Transcoder>, config: ProcessorConfig) -> Self {
        Self {
            transcoder,
            config,
            loaded: OnceCell::new(),
        }
    }

    /// Load the transcoder once. A failed load is retried on the next call.
    pub async fn ensure_loaded(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                self.transcoder.load().await?;
                info!("Transcoder backend loaded");
                Ok::<(), ClipFxError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Release the scratch filesystem.
    pub async fn teardown(&self) {
        self.transcoder.terminate().await;
        debug!("Transcoder backend torn down");
    }

    pub async fn run(&self, file: &MediaFile, params: &FilterParams, job: &JobContext) -> Result<MediaBlob> {
        params.color.validate()?;
        params.time_remap()?;
        self.ensure_loaded().await?;
        if params.is_identity() {
            debug!("identity parameters, returning input unchanged");
            job.complete();
            return Ok(MediaBlob::copy_of(file));
        }

        let id = Uuid::new_v4();
        let input = ScratchFile::new(
            self.transcoder.clone(),
            format!("input-{id}.{}", file.extension()),
        );
        let output = ScratchFile::new(self.transcoder.clone(), format!("output-{id}.mp4"));

        let result = self.transcode(file, params, &input, &output, job).await;
        input.remove().await;
        output.remove().await;

        let data = result?;
        job.ensure_current("return output")?;
        job.complete();
        Ok(MediaBlob::mp4(data))
    }

    async fn transcode(
        &self,
        file: &MediaFile,
        params: &FilterParams,
        input: &ScratchFile,
        output: &ScratchFile,
        job: &JobContext,
    ) -> Result<Vec<u8>> {
        job.report_phase(phases::STAGE_INPUT, 0.0);
        self.transcoder.write_file(input.name(), &file.data).await?;
        job.report_phase(phases::STAGE_INPUT, 1.0);
        job.ensure_current("exec")?;

        let transcode = TranscodeJob {
            input: input.name().to_string(),
            output: output.name().to_string(),
            filter_graph: build_filter_graph(params, self.config.output_frame_rate),
            encoder: self.config.encoder.clone(),
            expected_duration: None,
            speed: f64::from(params.speed),
        };
        info!(
            input = %transcode.input,
            speed = params.speed,
            filter = transcode.filter_graph.as_deref().unwrap_or(""),
            "Transcode job started"
        );

        self.transcoder
            .exec(&transcode, job.phase_callback(phases::TRANSCODE))
            .await?;
        job.ensure_current("read output")?;

        let data = self.transcoder.read_file(output.name()).await?;
        info!(bytes = data.len(), "Transcode job finished");
        Ok(data)
    }
}

impl std::fmt::Debug for TranscoderDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscoderDriver")
            .field("config", &self.config)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
