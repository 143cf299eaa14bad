//! ClipFx Media - FFmpeg integration for video I/O
//!
//! This crate handles:
//! - The codec seams the frame pipeline is written against (decoder, encoder, provider)
//! - Media file probing through ffprobe
//! - Pull-by-timestamp decoding and fragmented MP4 encoding over ffmpeg pipes
//! - The whole-file transcoder and its scratch filesystem
//! - Locating or downloading the ffmpeg binaries

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod install;
pub mod probe;
pub mod process;
pub mod transcoder;

pub use codec::{CodecProvider, DecodedFrame, FfmpegCodecs, FrameDecoder, FrameEncoder};
pub use decoder::FfmpegDecoder;
pub use encoder::{EncoderSettings, FfmpegEncoder};
pub use install::ensure_ffmpeg;
pub use probe::{parse_probe_json, probe_file};
pub use transcoder::{FfmpegTranscoder, TranscodeJob, Transcoder};
