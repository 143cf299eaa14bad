//! ClipFx Core - Foundation types for the retiming and color pipeline
//!
//! This crate provides the types shared by every backend:
//! - Effect parameters (FilterOptions, FilterParams, ColorParams)
//! - Time representation and speed remapping (RationalTime, FrameRate, TimeRemap)
//! - Frame buffers
//! - Media files, output blobs and streamed job output
//! - Progress tracking and job generations

pub mod error;
pub mod frame;
pub mod generation;
pub mod media;
pub mod params;
pub mod progress;
pub mod time;

pub use error::{ClipFxError, ErrorKind, Result};
pub use frame::FrameBuffer;
pub use generation::{Generation, JobTicket};
pub use media::{JobOutput, MediaBlob, MediaFile, SourceMedia};
pub use params::{ColorParams, FilterOptions, FilterParams};
pub use progress::{ProgressCallback, ProgressPhase, ProgressTracker};
pub use time::{FrameRate, OutputFrame, RationalTime, TimeRemap};

/// Pacing constants for long per-frame loops.
pub mod pacing {
    /// Frames processed between explicit yields to the runtime.
    pub const YIELD_INTERVAL: u32 = 8;

    /// Frames processed between progress reports.
    pub const PROGRESS_INTERVAL: u32 = 10;
}
