//! GPU errors.

use clipfx_core::ClipFxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    RequestDevice(String),
    #[error("frame size {got_w}x{got_h} doesn't match {want_w}x{want_h}")]
    SizeMismatch {
        want_w: u32,
        want_h: u32,
        got_w: u32,
        got_h: u32,
    },
    #[error("device reported: {0}")]
    Device(String),
    #[error("readback failed: {0}")]
    Readback(String),
    #[error("renderer not initialized")]
    NotInitialized,
}

impl From<GpuError> for ClipFxError {
    fn from(err: GpuError) -> Self {
        ClipFxError::Gpu(err.to_string())
    }
}

pub type GpuResult<T> = std::result::Result<T, GpuError>;
