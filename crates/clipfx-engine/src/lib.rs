//! ClipFx Engine - backends and the processor facade
//!
//! This crate wires the lower layers into runnable jobs:
//! - Configuration and backend selection
//! - The frame-codec backend (decode, GPU or CPU color, encode)
//! - The transcoder backend (one filter graph per job)
//! - [`VideoProcessor`], which owns load state, progress and teardown

pub mod config;
pub mod frame_codec;
pub mod job;
pub mod processor;
pub mod transcode;

pub use config::{BackendMode, ProcessorConfig, MODE_ENV};
pub use frame_codec::{FrameCodecDriver, TempSource};
pub use job::{JobContext, LoadRamp, LOAD_RAMP_CEILING};
pub use processor::VideoProcessor;
pub use transcode::{ScratchFile, TranscoderDriver};
