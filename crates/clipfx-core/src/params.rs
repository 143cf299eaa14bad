//! Effect parameters: the caller-facing optional form and the resolved form.
//!
//! [`FilterOptions`] mirrors what a caller hands in (every field optional).
//! [`FilterOptions::resolve`] validates it once and produces a fully-populated
//! [`FilterParams`]; nothing downstream ever looks at an `Option` again.

use crate::error::{ClipFxError, Result};
use crate::time::TimeRemap;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Neutral playback speed.
pub const DEFAULT_SPEED: f32 = 1.0;
/// Neutral contrast multiplier.
pub const DEFAULT_CONTRAST: f32 = 1.0;
/// Neutral saturation multiplier.
pub const DEFAULT_SATURATION: f32 = 1.0;
/// Neutral temperature shift.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
/// Neutral shadow lift.
pub const DEFAULT_SHADOWS: f32 = 1.0;
/// Neutral highlight boost.
pub const DEFAULT_HIGHLIGHTS: f32 = 1.0;

const SPEED_RANGE: RangeInclusive<f32> = 0.0..=16.0;
const CONTRAST_RANGE: RangeInclusive<f32> = 0.0..=4.0;
const SATURATION_RANGE: RangeInclusive<f32> = 0.0..=4.0;
const TEMPERATURE_RANGE: RangeInclusive<f32> = -1.0..=1.0;
const SHADOWS_RANGE: RangeInclusive<f32> = 0.0..=4.0;
const HIGHLIGHTS_RANGE: RangeInclusive<f32> = 0.0..=4.0;

/// Optional effect settings as supplied by a caller.
///
/// Missing fields take the neutral defaults:
///
/// | field         | default | accepted range |
/// |---------------|---------|----------------|
/// | `speed`       | 1.0     | (0, 16]        |
/// | `contrast`    | 1.0     | (0, 4]         |
/// | `saturation`  | 1.0     | [0, 4]         |
/// | `temperature` | 0.0     | [-1, 1]        |
/// | `shadows`     | 1.0     | (0, 4]         |
/// | `highlights`  | 1.0     | [0, 4]         |
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub speed: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub temperature: Option<f32>,
    pub shadows: Option<f32>,
    pub highlights: Option<f32>,
}

impl FilterOptions {
    /// Options that only change speed.
    pub fn speed(speed: f32) -> Self {
        Self {
            speed: Some(speed),
            ..Self::default()
        }
    }

    /// Options that only change contrast.
    pub fn contrast(contrast: f32) -> Self {
        Self {
            contrast: Some(contrast),
            ..Self::default()
        }
    }

    /// Validate and fill in defaults.
    pub fn resolve(&self) -> Result<FilterParams> {
        let speed = self.speed.unwrap_or(DEFAULT_SPEED);
        check("speed", speed, SPEED_RANGE, false)?;

        let color = ColorParams {
            contrast: self.contrast.unwrap_or(DEFAULT_CONTRAST),
            saturation: self.saturation.unwrap_or(DEFAULT_SATURATION),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            shadows: self.shadows.unwrap_or(DEFAULT_SHADOWS),
            highlights: self.highlights.unwrap_or(DEFAULT_HIGHLIGHTS),
        };
        color.validate()?;

        Ok(FilterParams { color, speed })
    }
}

/// The five color-domain parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    pub contrast: f32,
    pub saturation: f32,
    pub temperature: f32,
    pub shadows: f32,
    pub highlights: f32,
}

impl ColorParams {
    /// The identity color transform.
    pub const NEUTRAL: Self = Self {
        contrast: DEFAULT_CONTRAST,
        saturation: DEFAULT_SATURATION,
        temperature: DEFAULT_TEMPERATURE,
        shadows: DEFAULT_SHADOWS,
        highlights: DEFAULT_HIGHLIGHTS,
    };

    /// True when every field sits at its neutral value.
    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// Check finiteness and documented ranges.
    pub fn validate(&self) -> Result<()> {
        check("contrast", self.contrast, CONTRAST_RANGE, false)?;
        check("saturation", self.saturation, SATURATION_RANGE, true)?;
        check("temperature", self.temperature, TEMPERATURE_RANGE, true)?;
        check("shadows", self.shadows, SHADOWS_RANGE, false)?;
        check("highlights", self.highlights, HIGHLIGHTS_RANGE, true)?;
        Ok(())
    }
}

impl Default for ColorParams {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Fully-resolved parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub color: ColorParams,
    pub speed: f32,
}

impl FilterParams {
    /// Parameters that change nothing.
    pub const IDENTITY: Self = Self {
        color: ColorParams::NEUTRAL,
        speed: DEFAULT_SPEED,
    };

    /// All color fields neutral and speed 1.
    pub fn is_identity(&self) -> bool {
        self.color.is_neutral() && !self.changes_speed()
    }

    /// Speed differs from 1.
    pub fn changes_speed(&self) -> bool {
        self.speed != DEFAULT_SPEED
    }

    /// Time remapper for this job's speed.
    pub fn time_remap(&self) -> Result<TimeRemap> {
        TimeRemap::new(self.speed as f64)
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn check(name: &str, value: f32, range: RangeInclusive<f32>, lower_inclusive: bool) -> Result<()> {
    let below = if lower_inclusive {
        value < *range.start()
    } else {
        value <= *range.start()
    };
    if !value.is_finite() || below || value > *range.end() {
        let open = if lower_inclusive { '[' } else { '(' };
        return Err(ClipFxError::InvalidParameter(format!(
            "{name} must be within {open}{}, {}], got {value}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}
