//! GPU color pass against the CPU reference.
//!
//! Needs a real adapter; each test returns early when none is available.

use crate::fakes::{FakeCodecs, SourceFill};
use clipfx_color::{apply_in_place, wgsl_source};
use clipfx_core::{ColorParams, FilterOptions, FrameBuffer, FrameRate, Generation, MediaFile, ProgressTracker};
use clipfx_engine::{FrameCodecDriver, JobContext, ProcessorConfig};
use clipfx_gpu::ColorRenderer;
use std::sync::Arc;

/// Largest per-channel difference allowed between the GPU and CPU paths.
const TOLERANCE: i16 = 2;

fn renderer(width: u32, height: u32) -> Option<ColorRenderer> {
    let mut renderer = ColorRenderer::new(width, height);
    if renderer.init() {
        Some(renderer)
    } else {
        eprintln!("no GPU adapter, skipping");
        None
    }
}

fn graded_params() -> Vec<ColorParams> {
    vec![
        ColorParams {
            contrast: 1.5,
            ..ColorParams::NEUTRAL
        },
        ColorParams {
            saturation: 0.0,
            ..ColorParams::NEUTRAL
        },
        ColorParams {
            temperature: 0.8,
            shadows: 1.6,
            ..ColorParams::NEUTRAL
        },
        ColorParams {
            contrast: 0.7,
            saturation: 1.8,
            temperature: -0.6,
            shadows: 0.5,
            highlights: 2.0,
        },
    ]
}

fn max_channel_diff(a: &[u8], b: &[u8]) -> i16 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (*x as i16 - *y as i16).abs())
        .max()
        .unwrap_or(0)
}

#[test]
fn gpu_matches_cpu_reference() {
    let (width, height) = (64, 36);
    let Some(mut gpu) = renderer(width, height) else {
        return;
    };
    let source = FrameBuffer::test_pattern(width, height);

    for params in graded_params() {
        let graded = gpu.process_frame(&source, &params).expect("GPU frame");
        let mut reference = source.clone();
        apply_in_place(&mut reference.data, &params).unwrap();

        let diff = max_channel_diff(&graded.data, &reference.data);
        assert!(diff <= TOLERANCE, "{params:?}: max channel diff {diff}");
    }
    assert_eq!(gpu.frames_rendered(), 4);
}

#[test]
fn gpu_output_is_not_flipped() {
    let (width, height) = (16, 16);
    let Some(mut gpu) = renderer(width, height) else {
        return;
    };
    let mut source = FrameBuffer::new(width, height);
    source.fill([0, 0, 0, 255]);
    source.row_mut(0).copy_from_slice(&[255u8; 16 * 4]);

    let graded = gpu
        .process_frame(&source, &ColorParams::NEUTRAL)
        .expect("GPU frame");
    assert_eq!(&graded.row(0)[..4], &[255, 255, 255, 255]);
    assert_eq!(&graded.row(height - 1)[..4], &[0, 0, 0, 255]);
}

#[tokio::test]
async fn frame_codec_driver_grades_on_the_gpu() {
    if renderer(8, 4).is_none() {
        return;
    }
    let mut fake = FakeCodecs::new(8, 4, 1.0, FrameRate::FPS_30);
    fake.fill = SourceFill::Gray(200);
    let codecs = Arc::new(fake);
    let config = ProcessorConfig {
        use_gpu: true,
        ..ProcessorConfig::default()
    };
    let generation = Generation::new();
    let job = JobContext::new(generation.ticket(), ProgressTracker::new());
    let options = FilterOptions {
        contrast: Some(1.5),
        temperature: Some(0.3),
        ..FilterOptions::default()
    };
    let params = options.resolve().unwrap();

    FrameCodecDriver::new(codecs.clone(), config)
        .run(&MediaFile::new("clip.mp4", vec![0u8; 16]), &params, &job)
        .await
        .unwrap();

    let mut expected = [200u8, 200, 200, 255];
    apply_in_place(&mut expected, &params.color).unwrap();
    let encoded = codecs.encoded();
    assert_eq!(encoded.len(), 30);
    for frame in &encoded {
        let diff = max_channel_diff(&frame.first_pixel, &expected);
        assert!(diff <= TOLERANCE, "{:?} vs {expected:?}", frame.first_pixel);
    }
    assert_eq!(codecs.counters.open_resources(), (0, 0, 0));
}

#[test]
fn wrong_frame_size_falls_back() {
    let Some(mut gpu) = renderer(8, 8) else {
        return;
    };
    let frame = FrameBuffer::new(4, 4);
    assert!(gpu.process_frame(&frame, &ColorParams::NEUTRAL).is_none());
}

#[test]
fn destroyed_renderer_stays_unavailable() {
    let mut gpu = ColorRenderer::new(8, 8);
    gpu.destroy();
    gpu.destroy();
    assert!(!gpu.init());
    assert!(!gpu.is_available());
    assert!(gpu
        .process_frame(&FrameBuffer::new(8, 8), &ColorParams::NEUTRAL)
        .is_none());
}

#[test]
fn shader_source_declares_both_entry_points() {
    let source = wgsl_source();
    assert!(source.contains(&format!("fn {}", clipfx_color::shader::VERTEX_ENTRY)));
    assert!(source.contains(&format!("fn {}", clipfx_color::shader::FRAGMENT_ENTRY)));
}
