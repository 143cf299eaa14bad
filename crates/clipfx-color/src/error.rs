//! Color subsystem errors.

use clipfx_core::ClipFxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColorError {
    #[error("RGBA buffer length {0} is not a multiple of 4")]
    UnalignedBuffer(usize),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl From<ColorError> for ClipFxError {
    fn from(err: ColorError) -> Self {
        ClipFxError::InvalidParameter(err.to_string())
    }
}
