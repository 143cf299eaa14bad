//! Progress reporting shared between a running job and whoever polls it.
//!
//! Values are percentages in `[0, 100]` and never go backwards within one job.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Callback receiving a percentage in `[0, 100]`.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// A sub-range of the overall percentage owned by one pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPhase {
    pub start: f32,
    pub end: f32,
}

impl ProgressPhase {
    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Percentage for a completion fraction of this phase.
    pub fn at(self, fraction: f64) -> f32 {
        let fraction = fraction.clamp(0.0, 1.0) as f32;
        self.start + (self.end - self.start) * fraction
    }
}

#[derive(Default)]
struct ProgressInner {
    value: f32,
    callback: Option<ProgressCallback>,
}

/// Monotonic progress state with an optional listener.
///
/// Cloning yields another handle to the same state.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<ProgressInner>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new job: value back to 0 and `callback` installed as the listener.
    pub fn reset(&self, callback: Option<ProgressCallback>) {
        let mut inner = self.inner.lock();
        inner.value = 0.0;
        inner.callback = callback;
    }

    /// Report a new percentage.
    ///
    /// The value is clamped to `[0, 100]`; anything not above the current value is
    /// ignored. The listener is invoked outside the lock. Returns the current value.
    pub fn report(&self, percent: f32) -> f32 {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let callback = {
            let mut inner = self.inner.lock();
            if percent <= inner.value {
                return inner.value;
            }
            inner.value = percent;
            inner.callback.clone()
        };
        if let Some(callback) = callback {
            callback(percent);
        }
        percent
    }

    /// Report `fraction` of `phase`.
    pub fn report_phase(&self, phase: ProgressPhase, fraction: f64) -> f32 {
        self.report(phase.at(fraction))
    }

    /// Mark success.
    pub fn complete(&self) {
        self.report(100.0);
    }

    /// Current percentage.
    pub fn get(&self) -> f32 {
        self.inner.lock().value
    }

    /// Drop the listener, keeping the value.
    pub fn detach(&self) {
        self.inner.lock().callback = None;
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ProgressTracker")
            .field("value", &inner.value)
            .field("has_callback", &inner.callback.is_some())
            .finish()
    }
}
