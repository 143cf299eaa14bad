//! Error types for ClipFx.

use thiserror::Error;

/// Main error type for ClipFx operations.
#[derive(Error, Debug)]
pub enum ClipFxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend is not loaded; call load() first")]
    NotLoaded,

    #[error("Backend is busy: {0}")]
    Busy(String),

    #[error("Job aborted: {0}")]
    Aborted(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Transcode failed during {stage}: {message}")]
    Transcode { stage: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification callers use to tell failures apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed something the pipeline rejects up front.
    BadInput,
    /// The platform lacks a required codec, tool or device.
    Unsupported,
    /// The backend was used out of order, torn down or is busy.
    Lifecycle,
    /// Something failed while decoding, processing or encoding.
    Processing,
}

impl ClipFxError {
    /// Wrap a failure from the external transcoder with the stage it happened in.
    pub fn transcode(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Transcode {
            stage,
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) | Self::Config(_) => ErrorKind::BadInput,
            Self::BackendUnavailable(_) => ErrorKind::Unsupported,
            Self::NotLoaded | Self::Busy(_) | Self::Aborted(_) => ErrorKind::Lifecycle,
            Self::Io(_)
            | Self::Probe(_)
            | Self::Decoder(_)
            | Self::Encoder(_)
            | Self::Gpu(_)
            | Self::Transcode { .. }
            | Self::Internal(_) => ErrorKind::Processing,
        }
    }

    /// True for validation failures raised before any I/O.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::BadInput
    }
}

/// Result type alias for ClipFx operations.
pub type Result<T> = std::result::Result<T, ClipFxError>;
