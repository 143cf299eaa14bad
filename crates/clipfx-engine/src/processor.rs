//! The processor facade: load state, progress and backend lifecycle.

use crate::config::{BackendMode, ProcessorConfig};
use crate::frame_codec::FrameCodecDriver;
use crate::job::{JobContext, LoadRamp};
use crate::transcode::TranscoderDriver;
use clipfx_core::{
    ClipFxError, FilterOptions, FilterParams, Generation, MediaBlob, MediaFile, ProgressCallback,
    ProgressTracker, Result,
};
use clipfx_media::{CodecProvider, FfmpegCodecs, FfmpegTranscoder, Transcoder};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
enum Backend {
    Transcoder(Arc<TranscoderDriver>),
    FrameCodec(Arc<FrameCodecDriver>),
}

impl Backend {
    async fn load(&self) -> Result<()> {
        match self {
            Self::Transcoder(driver) => driver.ensure_loaded().await,
            Self::FrameCodec(driver) => driver.load().await,
        }
    }

    async fn run(&self, file: &MediaFile, params: &FilterParams, job: &JobContext) -> Result<MediaBlob> {
        match self {
            Self::Transcoder(driver) => driver.run(file, params, job).await,
            Self::FrameCodec(driver) => driver.run(file, params, job).await,
        }
    }

    async fn teardown(&self) {
        match self {
            Self::Transcoder(driver) => driver.teardown().await,
            Self::FrameCodec(driver) => driver.teardown().await,
        }
    }
}

#[derive(Default)]
struct State {
    mode: BackendMode,
    backend: Option<Backend>,
    loaded: bool,
    loading: bool,
    load_error: Option<String>,
    /// Id of the job in flight.
    job: Option<u64>,
    next_job: u64,
}

/// Clears the in-flight marker when a job ends, unless the state has moved on since.
struct JobGuard<'a> {
    state: &'a Mutex<State>,
    id: u64,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.job == Some(self.id) {
            state.job = None;
        }
    }
}

/// Applies retiming and color filters to videos through one of two backends.
///
/// All methods take `&self`; share it behind an `Arc` to tear it down from another task
/// while a job runs.
pub struct VideoProcessor {
    config: ProcessorConfig,
    codecs: Arc<dyn CodecProvider>,
    transcoder: Arc<dyn Transcoder>,
    state: Mutex<State>,
    generation: Generation,
    progress: ProgressTracker,
}

impl VideoProcessor {
    /// A processor backed by ffmpeg.
    pub fn new(config: ProcessorConfig) -> Self {
        let codecs = Arc::new(FfmpegCodecs::new(config.auto_download_ffmpeg));
        let transcoder = Arc::new(FfmpegTranscoder::new(
            config.scratch_dir.clone(),
            config.auto_download_ffmpeg,
        ));
        Self::with_backends(config, codecs, transcoder)
    }

    /// A processor over the given codec provider and transcoder.
    pub fn with_backends(
        config: ProcessorConfig,
        codecs: Arc<dyn CodecProvider>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let state = State {
            mode: config.mode,
            ..State::default()
        };
        Self {
            config,
            codecs,
            transcoder,
            state: Mutex::new(state),
            generation: Generation::new(),
            progress: ProgressTracker::new(),
        }
    }

    fn build_backend(&self, mode: BackendMode) -> Backend {
        let config = ProcessorConfig {
            mode,
            ..self.config.clone()
        };
        match mode {
            BackendMode::Transcoder => {
                Backend::Transcoder(Arc::new(TranscoderDriver::new(self.transcoder.clone(), config)))
            }
            BackendMode::FrameCodec => {
                Backend::FrameCodec(Arc::new(FrameCodecDriver::new(self.codecs.clone(), config)))
            }
        }
    }

    /// Prepare the current backend. Progress rises toward 90 while loading and ends at 100.
    ///
    /// A failed load is remembered in [`load_error`](Self::load_error) and jobs stay
    /// blocked until a later load succeeds.
    pub async fn load(&self, on_progress: Option<ProgressCallback>) -> Result<()> {
        let (backend, job) = {
            let mut state = self.state.lock();
            if state.loaded {
                drop(state);
                if let Some(callback) = on_progress {
                    callback(100.0);
                }
                return Ok(());
            }
            if state.loading {
                return Err(ClipFxError::Busy("load already in progress".into()));
            }
            state.loading = true;
            state.load_error = None;
            let mode = state.mode;
            let backend = match &state.backend {
                Some(backend) => backend.clone(),
                None => {
                    let backend = self.build_backend(mode);
                    state.backend = Some(backend.clone());
                    backend
                }
            };
            self.progress.reset(on_progress);
            (backend, JobContext::new(self.generation.ticket(), self.progress.clone()))
        };

        info!(mode = %self.mode(), "Loading backend");
        let ramp = LoadRamp::start(job.clone());
        let result = backend.load().await;
        drop(ramp);

        {
            let mut state = self.state.lock();
            job.ensure_current("load")?;
            state.loading = false;
            match &result {
                Ok(()) => state.loaded = true,
                Err(e) => state.load_error = Some(e.to_string()),
            }
        }
        match result {
            Ok(()) => {
                job.complete();
                info!("Backend loaded");
                Ok(())
            }
            Err(e) => {
                warn!("Backend failed to load: {e}");
                Err(e)
            }
        }
    }

    /// Percentage of the current load or job.
    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Message of the last failed load, cleared by the next load attempt.
    pub fn load_error(&self) -> Option<String> {
        self.state.lock().load_error.clone()
    }

    pub fn mode(&self) -> BackendMode {
        self.state.lock().mode
    }

    /// True while a job is running.
    pub fn is_busy(&self) -> bool {
        self.state.lock().job.is_some()
    }

    fn begin_job(&self) -> Result<(Backend, JobGuard<'_>, JobContext)> {
        let mut state = self.state.lock();
        if !state.loaded {
            return Err(ClipFxError::NotLoaded);
        }
        let Some(backend) = state.backend.clone() else {
            return Err(ClipFxError::NotLoaded);
        };
        if state.job.is_some() {
            return Err(ClipFxError::Busy("another job is in flight".into()));
        }
        state.next_job += 1;
        let id = state.next_job;
        state.job = Some(id);
        let guard = JobGuard {
            state: &self.state,
            id,
        };
        let job = JobContext::new(self.generation.ticket(), self.progress.clone());
        Ok((backend, guard, job))
    }

    /// Retime and grade `file`.
    ///
    /// Parameters are validated before anything else runs. Identity parameters return the
    /// input bytes unchanged.
    pub async fn apply_filters(
        &self,
        file: &MediaFile,
        options: FilterOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<MediaBlob> {
        let params = options.resolve()?;
        let (backend, _guard, job) = self.begin_job()?;
        self.progress.reset(on_progress);
        debug!(?params, bytes = file.len(), "apply_filters");

        let result = backend.run(file, &params, &job).await;
        if !job.is_current() {
            return Err(ClipFxError::Aborted("backend was torn down during the job".into()));
        }
        result
    }

    /// Change playback speed only.
    pub async fn change_speed(&self, file: &MediaFile, speed: f32) -> Result<MediaBlob> {
        self.apply_filters(file, FilterOptions::speed(speed), None).await
    }

    /// Change contrast only.
    pub async fn change_contrast(&self, file: &MediaFile, contrast: f32) -> Result<MediaBlob> {
        self.apply_filters(file, FilterOptions::contrast(contrast), None).await
    }

    /// Tear down the backend. In-flight jobs end with `Aborted`. Safe to call repeatedly;
    /// a later [`load`](Self::load) starts over.
    pub async fn destroy(&self) {
        let backend = {
            let mut state = self.state.lock();
            self.generation.advance();
            state.loaded = false;
            state.loading = false;
            state.job = None;
            state.backend.take()
        };
        self.progress.detach();
        if let Some(backend) = backend {
            backend.teardown().await;
            info!("Video processor destroyed");
        }
    }

    /// Switch backends. Fails with `Busy` while a job or load is in flight; otherwise the
    /// old backend is torn down and the new one must be loaded before use.
    pub async fn switch_mode(&self, mode: BackendMode) -> Result<()> {
        let old = {
            let mut state = self.state.lock();
            if state.job.is_some() || state.loading {
                return Err(ClipFxError::Busy(format!(
                    "cannot switch to {mode} while work is in flight"
                )));
            }
            if state.mode == mode {
                return Ok(());
            }
            self.generation.advance();
            state.mode = mode;
            state.loaded = false;
            state.load_error = None;
            state.backend.replace(self.build_backend(mode))
        };
        if let Some(old) = old {
            old.teardown().await;
        }
        info!(%mode, "Switched backend");
        Ok(())
    }
}

impl std::fmt::Debug for VideoProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VideoProcessor")
            .field("mode", &state.mode)
            .field("loaded", &state.loaded)
            .field("loading", &state.loading)
            .field("busy", &state.job.is_some())
            .field("progress", &self.progress)
            .finish()
    }
}
