//! Transcoder backend against a fake scratch filesystem.

use crate::fakes::{assert_monotonic_to_100, progress_recorder, FakeTranscoder};
use clipfx_core::{
    ClipFxError, FilterOptions, FilterParams, FrameRate, Generation, MediaFile, ProgressTracker,
};
use clipfx_engine::{JobContext, ProcessorConfig, TranscoderDriver};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn setup() -> (Arc<FakeTranscoder>, TranscoderDriver) {
    let fake = Arc::new(FakeTranscoder::new());
    let driver = TranscoderDriver::new(fake.clone(), ProcessorConfig::default());
    (fake, driver)
}

fn job() -> (JobContext, ProgressTracker, Generation) {
    let generation = Generation::new();
    let tracker = ProgressTracker::new();
    (JobContext::new(generation.ticket(), tracker.clone()), tracker, generation)
}

fn source() -> MediaFile {
    MediaFile::new("holiday.MOV", b"source-bytes".to_vec())
}

#[tokio::test]
async fn load_is_memoised() {
    let (fake, driver) = setup();
    driver.ensure_loaded().await.unwrap();
    driver.ensure_loaded().await.unwrap();
    assert_eq!(fake.loads.load(Ordering::SeqCst), 1);
    assert!(driver.is_loaded());
}

#[tokio::test]
async fn failed_load_is_retried() {
    let (fake, driver) = setup();
    fake.fail_load.store(true, Ordering::SeqCst);
    let err = driver.ensure_loaded().await.unwrap_err();
    assert!(matches!(err, ClipFxError::BackendUnavailable(_)));
    assert!(!driver.is_loaded());

    fake.fail_load.store(false, Ordering::SeqCst);
    driver.ensure_loaded().await.unwrap();
    assert_eq!(fake.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn identity_skips_the_transcode() {
    let (fake, driver) = setup();
    let (job, tracker, _generation) = job();

    let blob = driver.run(&source(), &FilterParams::IDENTITY, &job).await.unwrap();

    assert_eq!(blob.data, b"source-bytes");
    assert_eq!(blob.mime_type, "video/quicktime");
    assert_eq!(fake.execs.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.get(), 100.0);
}

#[tokio::test]
async fn speed_and_color_share_one_filter_graph() {
    let (fake, driver) = setup();
    let (job, _tracker, _generation) = job();
    let params = FilterOptions {
        speed: Some(2.0),
        contrast: Some(1.5),
        ..FilterOptions::default()
    }
    .resolve()
    .unwrap();

    let blob = driver.run(&source(), &params, &job).await.unwrap();

    let transcode = fake.last_job().unwrap();
    assert!(transcode.input.starts_with("input-"));
    assert!(transcode.input.ends_with(".mov"));
    assert!(transcode.output.starts_with("output-"));
    assert!(transcode.output.ends_with(".mp4"));
    assert_eq!(transcode.speed, 2.0);

    let graph = transcode.filter_graph.unwrap();
    let geq = graph.find("geq=").unwrap();
    let setpts = graph.find("setpts=PTS/2").unwrap();
    assert!(geq < setpts, "color must run before retiming: {graph}");
    assert!(graph.ends_with("setpts=PTS/2"), "{graph}");

    assert!(blob.data.starts_with(b"mp4:"));
    assert!(blob.data.ends_with(b":source-bytes"));
    assert_eq!(blob.mime_type, "video/mp4");
}

#[tokio::test]
async fn speed_only_has_no_color_stage() {
    let (fake, driver) = setup();
    let (job, _tracker, _generation) = job();
    let params = FilterOptions::speed(0.5).resolve().unwrap();

    driver.run(&source(), &params, &job).await.unwrap();

    let graph = fake.last_job().unwrap().filter_graph.unwrap();
    assert_eq!(graph, "setpts=PTS/0.5");
}

#[tokio::test]
async fn source_rate_is_kept_unless_configured() {
    // No rate is forced by default, so a 60 fps source stays at 60 fps as it does on the
    // frame-codec backend.
    let (fake, driver) = setup();
    let (job, _tracker, _generation) = job();
    let params = FilterOptions::speed(2.0).resolve().unwrap();
    driver.run(&source(), &params, &job).await.unwrap();
    let graph = fake.last_job().unwrap().filter_graph.unwrap();
    assert!(!graph.contains("fps="), "{graph}");

    let fake = Arc::new(FakeTranscoder::new());
    let config = ProcessorConfig {
        output_frame_rate: Some(FrameRate::new(60, 1)),
        ..ProcessorConfig::default()
    };
    let pinned = TranscoderDriver::new(fake.clone(), config);
    pinned.run(&source(), &params, &job).await.unwrap();
    let graph = fake.last_job().unwrap().filter_graph.unwrap();
    assert_eq!(graph, "setpts=PTS/2,fps=60/1");
}

#[tokio::test]
async fn invalid_params_are_rejected_before_loading() {
    let (fake, driver) = setup();
    let (job, _tracker, _generation) = job();
    let bad = FilterParams {
        speed: 0.0,
        ..FilterParams::IDENTITY
    };

    let err = driver.run(&source(), &bad, &job).await.unwrap_err();

    assert!(err.is_validation(), "{err}");
    assert_eq!(fake.loads.load(Ordering::SeqCst), 0);
    assert!(!driver.is_loaded());
    assert_eq!(fake.file_count(), 0);
}

#[tokio::test]
async fn scratch_files_are_removed_after_success_and_failure() {
    let (fake, driver) = setup();
    let (job, _tracker, _generation) = job();
    let params = FilterOptions::contrast(1.3).resolve().unwrap();

    driver.run(&source(), &params, &job).await.unwrap();
    assert_eq!(fake.file_count(), 0);

    fake.fail_exec.store(true, Ordering::SeqCst);
    let err = driver.run(&source(), &params, &job).await.unwrap_err();
    assert!(matches!(err, ClipFxError::Transcode { stage: "exec", .. }), "{err}");
    assert_eq!(fake.file_count(), 0);
}

#[tokio::test]
async fn calls_use_distinct_scratch_names() {
    let (fake, driver) = setup();
    let (job, _tracker, _generation) = job();
    let params = FilterOptions::speed(1.25).resolve().unwrap();

    driver.run(&source(), &params, &job).await.unwrap();
    driver.run(&source(), &params, &job).await.unwrap();

    let jobs = fake.jobs.lock().clone();
    assert_eq!(jobs.len(), 2);
    assert_ne!(jobs[0].input, jobs[1].input);
    assert_ne!(jobs[0].output, jobs[1].output);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let (_fake, driver) = setup();
    let generation = Generation::new();
    let tracker = ProgressTracker::new();
    let (callback, seen) = progress_recorder();
    tracker.reset(Some(callback));
    let job = JobContext::new(generation.ticket(), tracker);
    let params = FilterOptions::speed(3.0).resolve().unwrap();

    driver.run(&source(), &params, &job).await.unwrap();

    let values = seen.lock().clone();
    assert_monotonic_to_100(&values);
    // Exec fractions land inside the transcode phase.
    assert!(values.contains(&50.0));
    assert!(values.contains(&95.0));
}

#[tokio::test]
async fn teardown_releases_scratch_filesystem() {
    let (fake, driver) = setup();
    driver.ensure_loaded().await.unwrap();
    driver.teardown().await;
    assert_eq!(fake.terminations.load(Ordering::SeqCst), 1);
}
