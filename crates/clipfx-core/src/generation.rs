//! Job generations.
//!
//! Every backend owns a [`Generation`]. A job captures a [`JobTicket`] when it starts and
//! checks it at each continuation; tearing the backend down advances the generation, so
//! jobs still in flight notice and stop instead of writing results into torn-down state.

use crate::error::{ClipFxError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Monotonic counter shared by a backend and its jobs.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation number.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate every outstanding ticket. Returns the new generation.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Capture the current generation for a new job.
    pub fn ticket(&self) -> JobTicket {
        JobTicket {
            generation: self.clone(),
            issued: self.current(),
        }
    }
}

/// A job's captured generation.
#[derive(Debug, Clone)]
pub struct JobTicket {
    generation: Generation,
    issued: u64,
}

impl JobTicket {
    /// The generation this ticket was issued under.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// True while the backend has not been torn down since the ticket was issued.
    pub fn is_current(&self) -> bool {
        self.generation.current() == self.issued
    }

    /// `Err(Aborted)` once the ticket is stale.
    pub fn ensure_current(&self, stage: &str) -> Result<()> {
        if self.is_current() {
            return Ok(());
        }
        debug!(
            stage,
            issued = self.issued,
            current = self.generation.current(),
            "stale job detected"
        );
        Err(ClipFxError::Aborted(format!(
            "backend was torn down before {stage}"
        )))
    }
}
