//! Per-job context handed to the drivers.

use clipfx_core::{JobTicket, ProgressPhase, ProgressTracker, Result};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Frame-codec progress phases.
pub mod phases {
    use clipfx_core::ProgressPhase;

    pub const PROBE: ProgressPhase = ProgressPhase::new(0.0, 15.0);
    pub const PROCESS: ProgressPhase = ProgressPhase::new(15.0, 65.0);
    pub const ENCODE: ProgressPhase = ProgressPhase::new(65.0, 95.0);
    /// Writing the input into the transcoder's scratch filesystem.
    pub const STAGE_INPUT: ProgressPhase = ProgressPhase::new(0.0, 5.0);
    /// The external transcode run.
    pub const TRANSCODE: ProgressPhase = ProgressPhase::new(5.0, 95.0);
}

/// A job's ticket plus the tracker it reports into.
///
/// Reports from a job whose ticket went stale are dropped, so an aborted job never
/// touches the progress of whatever runs after it.
#[derive(Debug, Clone)]
pub struct JobContext {
    ticket: JobTicket,
    progress: ProgressTracker,
}

impl JobContext {
    pub fn new(ticket: JobTicket, progress: ProgressTracker) -> Self {
        Self { ticket, progress }
    }

    pub fn ticket(&self) -> &JobTicket {
        &self.ticket
    }

    pub fn is_current(&self) -> bool {
        self.ticket.is_current()
    }

    /// `Aborted` once the backend has been torn down.
    pub fn ensure_current(&self, stage: &str) -> Result<()> {
        self.ticket.ensure_current(stage)
    }

    pub fn report(&self, percent: f32) {
        if self.ticket.is_current() {
            self.progress.report(percent);
        }
    }

    pub fn report_phase(&self, phase: ProgressPhase, fraction: f64) {
        self.report(phase.at(fraction));
    }

    pub fn complete(&self) {
        self.report(100.0);
    }

    /// Callback forwarding fractional progress into `phase`.
    pub fn phase_callback(&self, phase: ProgressPhase) -> clipfx_core::ProgressCallback {
        let job = self.clone();
        std::sync::Arc::new(move |fraction| job.report_phase(phase, fraction as f64))
    }
}

/// Highest value the synthesized load ramp reaches.
pub const LOAD_RAMP_CEILING: f32 = 90.0;

const LOAD_RAMP_TICK: Duration = Duration::from_millis(100);

/// Synthetic progress for loads that report none of their own.
///
/// Each tick closes a tenth of the remaining gap to [`LOAD_RAMP_CEILING`], so the value
/// keeps rising but never passes it. Stops when dropped.
pub struct LoadRamp {
    task: JoinHandle<()>,
}

impl LoadRamp {
    pub fn start(job: JobContext) -> Self {
        let task = tokio::spawn(async move {
            let mut value = 0.0f32;
            let mut interval = tokio::time::interval(LOAD_RAMP_TICK);
            interval.tick().await;
            loop {
                interval.tick().await;
                if !job.is_current() {
                    break;
                }
                value += (LOAD_RAMP_CEILING - value) * 0.1;
                job.report(value.min(LOAD_RAMP_CEILING));
            }
        });
        Self { task }
    }
}

impl Drop for LoadRamp {
    fn drop(&mut self) {
        self.task.abort();
    }
}
