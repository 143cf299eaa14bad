//! The processor facade: load state, job gating, mode switches and teardown.

use crate::fakes::{assert_monotonic_to_100, progress_recorder, FakeCodecs, FakeTranscoder};
use clipfx_core::{ClipFxError, ErrorKind, FilterOptions, MediaFile};
use clipfx_engine::{BackendMode, ProcessorConfig, VideoProcessor};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    codecs: Arc<FakeCodecs>,
    transcoder: Arc<FakeTranscoder>,
    processor: Arc<VideoProcessor>,
}

fn harness_with(mode: BackendMode, codecs: FakeCodecs) -> Harness {
    let codecs = Arc::new(codecs);
    let transcoder = Arc::new(FakeTranscoder::new());
    let config = ProcessorConfig {
        mode,
        use_gpu: false,
        ..ProcessorConfig::default()
    };
    let processor = Arc::new(VideoProcessor::with_backends(
        config,
        codecs.clone(),
        transcoder.clone(),
    ));
    Harness {
        codecs,
        transcoder,
        processor,
    }
}

fn harness(mode: BackendMode) -> Harness {
    harness_with(mode, FakeCodecs::ten_seconds())
}

fn slow_codecs() -> FakeCodecs {
    let mut codecs = FakeCodecs::new(4, 2, 60.0, clipfx_core::FrameRate::FPS_30);
    codecs.frame_delay = Some(Duration::from_millis(2));
    codecs
}

fn source() -> MediaFile {
    MediaFile::new("clip.mp4", b"not really an mp4".to_vec())
}

/// Wait until a job is running and has reported at least `at_least`.
async fn wait_for_progress(processor: &VideoProcessor, at_least: f32) {
    for _ in 0..2000 {
        let progress = processor.progress();
        if processor.is_busy() && progress >= at_least && progress < 100.0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("progress stuck at {}", processor.progress());
}

// ── Load lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn jobs_before_load_fail_with_not_loaded() {
    let h = harness(BackendMode::FrameCodec);
    let err = h
        .processor
        .change_speed(&source(), 2.0)
        .await
        .unwrap_err();
    assert!(matches!(err, ClipFxError::NotLoaded));
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert_eq!(h.codecs.counters.probes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn load_reports_progress_and_state() {
    let h = harness(BackendMode::FrameCodec);
    assert!(!h.processor.is_loaded());
    assert!(!h.processor.is_loading());

    let (callback, seen) = progress_recorder();
    h.processor.load(Some(callback)).await.unwrap();

    assert!(h.processor.is_loaded());
    assert!(!h.processor.is_loading());
    assert!(h.processor.load_error().is_none());
    assert_eq!(h.processor.progress(), 100.0);
    assert_monotonic_to_100(&seen.lock());

    // Loading again is a no-op.
    h.processor.load(None).await.unwrap();
    assert_eq!(h.codecs.counters.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_load_is_stored_and_blocks_jobs_until_retry() {
    let h = harness(BackendMode::Transcoder);
    h.transcoder.fail_load.store(true, Ordering::SeqCst);

    let err = h.processor.load(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(!h.processor.is_loaded());
    assert!(h
        .processor
        .load_error()
        .unwrap()
        .contains("transcoder failed to start"));

    let err = h.processor.change_contrast(&source(), 1.2).await.unwrap_err();
    assert!(matches!(err, ClipFxError::NotLoaded));

    h.transcoder.fail_load.store(false, Ordering::SeqCst);
    h.processor.load(None).await.unwrap();
    assert!(h.processor.load_error().is_none());
    h.processor.change_contrast(&source(), 1.2).await.unwrap();
}

// ── Jobs ───────────────────────────────────────────────────────

#[tokio::test]
async fn identity_returns_input_on_both_backends() {
    for mode in [BackendMode::FrameCodec, BackendMode::Transcoder] {
        let h = harness(mode);
        h.processor.load(None).await.unwrap();
        let file = source();
        let blob = h
            .processor
            .apply_filters(&file, FilterOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(blob.data, file.data.to_vec(), "{mode}");
        assert_eq!(h.codecs.counters.probes.load(Ordering::SeqCst), 0);
        assert_eq!(h.transcoder.execs.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn invalid_speed_is_rejected_before_any_work() {
    for mode in [BackendMode::FrameCodec, BackendMode::Transcoder] {
        let h = harness(mode);
        h.processor.load(None).await.unwrap();

        let err = h.processor.change_speed(&source(), -1.0).await.unwrap_err();

        assert!(err.is_validation(), "{mode}: {err}");
        assert_eq!(h.codecs.counters.probes.load(Ordering::SeqCst), 0);
        assert_eq!(h.transcoder.execs.load(Ordering::SeqCst), 0);
        assert_eq!(h.transcoder.file_count(), 0);
        assert!(!h.processor.is_busy());
    }
}

#[tokio::test]
async fn double_speed_through_the_facade() {
    let h = harness(BackendMode::FrameCodec);
    h.processor.load(None).await.unwrap();
    let (callback, seen) = progress_recorder();

    let blob = h
        .processor
        .apply_filters(&source(), FilterOptions::speed(2.0), Some(callback))
        .await
        .unwrap();

    assert_eq!(blob.mime_type, "video/mp4");
    assert_eq!(h.codecs.encoded().len(), 150);
    assert_monotonic_to_100(&seen.lock());
    assert!(!h.processor.is_busy());
}

#[tokio::test]
async fn second_job_while_busy_is_rejected() {
    let h = harness_with(BackendMode::FrameCodec, slow_codecs());
    h.processor.load(None).await.unwrap();

    let processor = h.processor.clone();
    let running = tokio::spawn(async move {
        processor
            .apply_filters(&source(), FilterOptions::speed(4.0), None)
            .await
    });
    wait_for_progress(&h.processor, 16.0).await;

    let err = h.processor.change_speed(&source(), 2.0).await.unwrap_err();
    assert!(matches!(err, ClipFxError::Busy(_)));

    running.await.unwrap().unwrap();
    assert!(!h.processor.is_busy());
}

// ── Teardown & mode switches ───────────────────────────────────

#[tokio::test]
async fn destroy_mid_job_aborts_and_releases_everything() {
    let h = harness_with(BackendMode::FrameCodec, slow_codecs());
    h.processor.load(None).await.unwrap();

    let processor = h.processor.clone();
    let running = tokio::spawn(async move {
        processor
            .apply_filters(&source(), FilterOptions::contrast(1.4), None)
            .await
    });
    wait_for_progress(&h.processor, 16.0).await;

    h.processor.destroy().await;
    let err = running.await.unwrap().unwrap_err();

    assert!(matches!(err, ClipFxError::Aborted(_)), "{err}");
    assert_eq!(h.codecs.counters.open_resources(), (0, 0, 0));
    assert_eq!(h.codecs.counters.aborted_encoders.load(Ordering::SeqCst), 1);
    assert!(!h.processor.is_loaded());
    assert!(h.processor.progress() < 100.0);

    // Destroy is idempotent and a later load starts over.
    h.processor.destroy().await;
    h.processor.load(None).await.unwrap();
    assert!(h.processor.is_loaded());
}

#[tokio::test]
async fn destroy_tears_down_the_transcoder() {
    let h = harness(BackendMode::Transcoder);
    h.processor.load(None).await.unwrap();
    h.processor.destroy().await;
    assert_eq!(h.transcoder.terminations.load(Ordering::SeqCst), 1);

    let err = h.processor.change_speed(&source(), 2.0).await.unwrap_err();
    assert!(matches!(err, ClipFxError::NotLoaded));
}

#[tokio::test]
async fn switch_mode_while_busy_fails() {
    let h = harness_with(BackendMode::FrameCodec, slow_codecs());
    h.processor.load(None).await.unwrap();

    let processor = h.processor.clone();
    let running = tokio::spawn(async move {
        processor
            .apply_filters(&source(), FilterOptions::speed(4.0), None)
            .await
    });
    wait_for_progress(&h.processor, 16.0).await;

    let err = h
        .processor
        .switch_mode(BackendMode::Transcoder)
        .await
        .unwrap_err();
    assert!(matches!(err, ClipFxError::Busy(_)));
    assert_eq!(h.processor.mode(), BackendMode::FrameCodec);

    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn switch_mode_when_idle_requires_a_new_load() {
    let h = harness(BackendMode::Transcoder);
    h.processor.load(None).await.unwrap();

    h.processor.switch_mode(BackendMode::FrameCodec).await.unwrap();

    assert_eq!(h.processor.mode(), BackendMode::FrameCodec);
    assert_eq!(h.transcoder.terminations.load(Ordering::SeqCst), 1);
    assert!(!h.processor.is_loaded());
    let err = h.processor.change_speed(&source(), 2.0).await.unwrap_err();
    assert!(matches!(err, ClipFxError::NotLoaded));

    h.processor.load(None).await.unwrap();
    h.processor.change_speed(&source(), 2.0).await.unwrap();
    assert_eq!(h.codecs.encoded().len(), 150);
}

#[tokio::test]
async fn switching_to_the_current_mode_is_a_no_op() {
    let h = harness(BackendMode::Transcoder);
    h.processor.load(None).await.unwrap();
    h.processor.switch_mode(BackendMode::Transcoder).await.unwrap();
    assert!(h.processor.is_loaded());
    assert_eq!(h.transcoder.terminations.load(Ordering::SeqCst), 0);
}
