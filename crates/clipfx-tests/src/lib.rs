//! Integration test crate for ClipFx.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! The fakes stand in for ffmpeg and count every resource they hand out.


#[cfg(test)]
mod frame_codec;

#[cfg(test)]
mod transcoder;

#[cfg(test)]
mod processor;

#[cfg(test)]
mod gpu;
