//! Frame-codec backend against instrumented fake codecs.

use crate::fakes::{
    assert_monotonic_to_100, encoded_frame_count, progress_recorder, FakeCodecs, SourceFill,
};
use clipfx_color::apply_in_place;
use clipfx_core::{
    ClipFxError, ColorParams, FilterOptions, FilterParams, FrameRate, Generation, MediaFile,
    ProgressTracker,
};
use clipfx_engine::{FrameCodecDriver, JobContext, ProcessorConfig};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn cpu_config() -> ProcessorConfig {
    ProcessorConfig {
        use_gpu: false,
        ..ProcessorConfig::default()
    }
}

fn driver(codecs: &Arc<FakeCodecs>) -> FrameCodecDriver {
    FrameCodecDriver::new(codecs.clone(), cpu_config())
}

fn job() -> (JobContext, ProgressTracker, Generation) {
    let generation = Generation::new();
    let tracker = ProgressTracker::new();
    (JobContext::new(generation.ticket(), tracker.clone()), tracker, generation)
}

fn source() -> MediaFile {
    MediaFile::new("clip.mp4", vec![0u8; 64])
}

fn params(options: FilterOptions) -> FilterParams {
    options.resolve().unwrap()
}

#[tokio::test]
async fn identity_returns_input_bytes_without_decoding() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let (job, tracker, _generation) = job();
    let file = MediaFile::new("clip.webm", vec![1, 2, 3, 4]);

    let blob = driver(&codecs).run(&file, &FilterParams::IDENTITY, &job).await.unwrap();

    assert_eq!(blob.data, vec![1, 2, 3, 4]);
    assert_eq!(blob.mime_type, "video/webm");
    assert_eq!(codecs.counters.probes.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.get(), 100.0);
}

#[tokio::test]
async fn double_speed_halves_frame_count() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let (job, _tracker, _generation) = job();

    let blob = driver(&codecs)
        .run(&source(), &params(FilterOptions::speed(2.0)), &job)
        .await
        .unwrap();

    let encoded = codecs.encoded();
    assert_eq!(encoded.len(), 150);
    assert_eq!(encoded_frame_count(&blob.data), 150);
    assert_eq!(blob.mime_type, "video/mp4");

    // Output i shows source frame 2i, untouched by the neutral color stage.
    for (i, frame) in encoded.iter().enumerate() {
        let expected = ((2 * i) % 256) as u8;
        assert_eq!(frame.first_pixel, [expected, expected, expected, 255], "frame {i}");
        assert!((frame.timestamp - i as f64 / 30.0).abs() < 1e-9);
    }
    let last = encoded.last().unwrap().timestamp;
    assert!((last + 1.0 / 30.0 - 5.0).abs() < 1e-6);
}

#[tokio::test]
async fn half_speed_repeats_source_frames() {
    let codecs = Arc::new(FakeCodecs::new(4, 2, 1.0, FrameRate::FPS_30));
    let (job, _tracker, _generation) = job();

    driver(&codecs)
        .run(&source(), &params(FilterOptions::speed(0.5)), &job)
        .await
        .unwrap();

    let encoded = codecs.encoded();
    assert_eq!(encoded.len(), 60);
    let requested = codecs.requested.lock().clone();
    assert!(requested.windows(2).all(|w| w[1] >= w[0]));
}

#[tokio::test]
async fn output_rate_override_resamples() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let config = ProcessorConfig {
        output_frame_rate: Some(FrameRate::FPS_24),
        ..cpu_config()
    };
    assert_eq!(codecs.media.frame_rate, FrameRate::FPS_30);
    let (job, _tracker, _generation) = job();

    FrameCodecDriver::new(codecs.clone(), config)
        .run(&source(), &params(FilterOptions::speed(2.0)), &job)
        .await
        .unwrap();

    assert_eq!(codecs.encoded().len(), 120);
    assert_eq!(*codecs.encoder_rates.lock(), vec![FrameRate::FPS_24]);
}

#[tokio::test]
async fn high_frame_rate_source_keeps_its_rate() {
    let codecs = Arc::new(FakeCodecs::new(8, 4, 2.0, FrameRate::new(60, 1)));
    let (job, _tracker, _generation) = job();

    driver(&codecs)
        .run(&source(), &params(FilterOptions::speed(2.0)), &job)
        .await
        .unwrap();

    assert_eq!(*codecs.encoder_rates.lock(), vec![FrameRate::new(60, 1)]);
    let encoded = codecs.encoded();
    assert_eq!(encoded.len(), 60);
    for (i, frame) in encoded.iter().enumerate() {
        let expected = (2 * i) as u8;
        assert_eq!(frame.first_pixel, [expected, expected, expected, 255], "frame {i}");
        assert!((frame.timestamp - i as f64 / 60.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn contrast_matches_cpu_formula_and_brightens_light_frames() {
    let mut fake = FakeCodecs::new(4, 2, 1.0, FrameRate::FPS_30);
    fake.fill = SourceFill::Gray(200);
    let codecs = Arc::new(fake);
    let (job, _tracker, _generation) = job();

    driver(&codecs)
        .run(&source(), &params(FilterOptions::contrast(1.5)), &job)
        .await
        .unwrap();

    let mut expected = [200u8, 200, 200, 255];
    let color = ColorParams {
        contrast: 1.5,
        ..ColorParams::NEUTRAL
    };
    apply_in_place(&mut expected, &color).unwrap();

    let encoded = codecs.encoded();
    assert_eq!(encoded.len(), 30);
    for frame in &encoded {
        assert_eq!(frame.first_pixel, expected);
        assert!(frame.mean_luma > 200.0 / 255.0);
    }
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let generation = Generation::new();
    let tracker = ProgressTracker::new();
    let (callback, seen) = progress_recorder();
    tracker.reset(Some(callback));
    let job = JobContext::new(generation.ticket(), tracker);

    driver(&codecs)
        .run(&source(), &params(FilterOptions::speed(2.0)), &job)
        .await
        .unwrap();

    let values = seen.lock().clone();
    assert_monotonic_to_100(&values);
    assert!(values.contains(&15.0));
    assert!(values.contains(&65.0));
    assert!(values.contains(&95.0));
    // Per-frame reports are batched: 150 frames at one report per 10.
    let in_process = values.iter().filter(|v| **v > 15.0 && **v < 65.0).count();
    assert_eq!(in_process, 14);
}

#[tokio::test]
async fn success_releases_every_resource() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let (job, _tracker, _generation) = job();

    driver(&codecs)
        .run(&source(), &params(FilterOptions::contrast(1.2)), &job)
        .await
        .unwrap();

    assert_eq!(codecs.counters.open_resources(), (0, 0, 0));
    assert_eq!(codecs.counters.finished_encoders.load(Ordering::SeqCst), 1);
    assert_eq!(codecs.counters.aborted_encoders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn decode_failure_aborts_and_releases() {
    let mut fake = FakeCodecs::ten_seconds();
    fake.fail_decode_at = Some(20);
    let codecs = Arc::new(fake);
    let (job, tracker, _generation) = job();

    let err = driver(&codecs)
        .run(&source(), &params(FilterOptions::speed(1.5)), &job)
        .await
        .unwrap_err();

    assert!(matches!(err, ClipFxError::Decoder(_)), "{err}");
    assert_eq!(codecs.counters.open_resources(), (0, 0, 0));
    assert_eq!(codecs.counters.aborted_encoders.load(Ordering::SeqCst), 1);
    assert_eq!(codecs.counters.finished_encoders.load(Ordering::SeqCst), 0);
    assert!(tracker.get() < 100.0);
}

#[tokio::test]
async fn encode_failure_aborts_and_releases() {
    let mut fake = FakeCodecs::ten_seconds();
    fake.fail_encode_at = Some(3);
    let codecs = Arc::new(fake);
    let (job, _tracker, _generation) = job();

    let err = driver(&codecs)
        .run(&source(), &params(FilterOptions::contrast(0.8)), &job)
        .await
        .unwrap_err();

    assert!(matches!(err, ClipFxError::Encoder(_)), "{err}");
    assert_eq!(codecs.counters.open_resources(), (0, 0, 0));
    assert_eq!(codecs.counters.aborted_encoders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_ticket_aborts_before_decoding() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let (job, _tracker, generation) = job();
    generation.advance();

    let err = driver(&codecs)
        .run(&source(), &params(FilterOptions::speed(2.0)), &job)
        .await
        .unwrap_err();

    assert!(matches!(err, ClipFxError::Aborted(_)));
    assert!(codecs.encoded().is_empty());
    assert_eq!(codecs.counters.open_resources(), (0, 0, 0));
}

#[tokio::test]
async fn invalid_params_fail_before_any_io() {
    let codecs = Arc::new(FakeCodecs::ten_seconds());
    let (job, _tracker, _generation) = job();
    let bad = FilterParams {
        speed: -1.0,
        ..FilterParams::IDENTITY
    };

    let err = driver(&codecs).run(&source(), &bad, &job).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(codecs.counters.probes.load(Ordering::SeqCst), 0);
    assert_eq!(codecs.counters.open_decoders.load(Ordering::SeqCst), 0);
}
