//! Time representation and speed remapping.
//!
//! Frame-grid timestamps use rational numbers to avoid floating-point accumulation
//! errors; the speed factor itself is real-valued, so remapped source times are `f64`.

use crate::error::{ClipFxError, Result};
use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on a frame grid, held as exact rational seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RationalTime {
    value: Rational64,
}

impl RationalTime {
    /// Time of frame `frames` at `rate`.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(frames * rate.denominator as i64, rate.numerator as i64),
        }
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Parse an ffprobe-style rate such as `"30000/1001"` or `"25"`.
    ///
    /// Returns `None` for zero or malformed rates (ffprobe reports `0/0` when unknown).
    pub fn parse(text: &str) -> Option<Self> {
        let (num, den) = match text.trim().split_once('/') {
            Some((n, d)) => (n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?),
            None => (text.trim().parse::<u32>().ok()?, 1),
        };
        (num > 0 && den > 0).then_some(Self::new(num, den))
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Argument form accepted by ffmpeg (`num/den`).
    pub fn as_ffmpeg_arg(self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }

    /// Common frame rates
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// Maps output-timeline timestamps to source-timeline timestamps for a playback speed.
///
/// `t_src = t_out * speed` and `new_duration = source_duration / speed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRemap {
    speed: f64,
}

impl TimeRemap {
    /// Create a remapper. Speeds that are not finite and strictly positive are rejected.
    pub fn new(speed: f64) -> Result<Self> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ClipFxError::InvalidParameter(format!(
                "speed must be a positive number, got {speed}"
            )));
        }
        Ok(Self { speed })
    }

    /// The speed factor.
    #[inline]
    pub fn speed(self) -> f64 {
        self.speed
    }

    /// Speed 1 leaves the timeline untouched.
    #[inline]
    pub fn is_identity(self) -> bool {
        self.speed == 1.0
    }

    /// Source timestamp sampled for an output timestamp.
    #[inline]
    pub fn remap(self, output_time: f64) -> f64 {
        output_time * self.speed
    }

    /// Duration of the retimed output.
    #[inline]
    pub fn new_duration(self, source_duration: f64) -> f64 {
        source_duration / self.speed
    }

    /// Output frames on the `rate` grid, in increasing time order.
    ///
    /// Iteration stops at the first frame whose source time is at or past the end of the
    /// source; frames are never extrapolated.
    pub fn output_frames(self, source_duration: f64, rate: FrameRate) -> OutputFrames {
        OutputFrames {
            remap: self,
            rate,
            source_duration,
            next: 0,
        }
    }

    /// Number of frames [`TimeRemap::output_frames`] yields.
    pub fn expected_frame_count(self, source_duration: f64, rate: FrameRate) -> u64 {
        self.output_frames(source_duration, rate).count() as u64
    }
}

/// One frame of a remapped timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputFrame {
    /// Position in the output stream.
    pub index: u64,
    /// Presentation time in the output, seconds.
    pub output_time: f64,
    /// Time to sample in the source, seconds.
    pub source_time: f64,
}

/// Iterator returned by [`TimeRemap::output_frames`].
#[derive(Debug, Clone)]
pub struct OutputFrames {
    remap: TimeRemap,
    rate: FrameRate,
    source_duration: f64,
    next: u64,
}

impl Iterator for OutputFrames {
    type Item = OutputFrame;

    fn next(&mut self) -> Option<OutputFrame> {
        let output_time = RationalTime::from_frames(self.next as i64, self.rate).to_seconds_f64();
        let source_time = self.remap.remap(output_time);
        if source_time >= self.source_duration {
            return None;
        }
        let frame = OutputFrame {
            index: self.next,
            output_time,
            source_time,
        };
        self.next += 1;
        Some(frame)
    }
}
