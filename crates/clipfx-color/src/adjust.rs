//! The color adjustment formulas.
//!
//! This is the single source of truth for the math. The CPU loop ([`crate::cpu`]), the
//! WGSL shader ([`crate::shader`]) and the ffmpeg filter graph ([`crate::filtergraph`])
//! all walk [`StageKind::ORDER`] and read their numbers from [`constants`].

use clipfx_core::ColorParams;
use glam::Vec3;

/// Numeric constants of the adjustment stages.
pub mod constants {
    use glam::Vec3;

    /// Pivot for the contrast stretch.
    pub const MIDPOINT: f32 = 0.5;
    /// Rec.601 luma weights used for desaturation.
    pub const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);
    /// `gamma = 1 / shadows^SHADOW_EXPONENT`.
    pub const SHADOW_EXPONENT: f32 = 0.6;
    /// `offset = (highlights - 1) * HIGHLIGHT_SCALE`.
    pub const HIGHLIGHT_SCALE: f32 = 0.3;
    /// Per-unit channel shift for positive (warm) temperature.
    pub const WARM_SHIFT: Vec3 = Vec3::new(0.15, 0.05, -0.15);
    /// Per-unit channel shift for negative (cool) temperature, scaled by `|t|`.
    pub const COOL_SHIFT: Vec3 = Vec3::new(-0.10, -0.02, 0.15);
}

/// The adjustment stages, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Contrast,
    Saturation,
    Shadows,
    Highlights,
    Temperature,
}

impl StageKind {
    /// Application order shared by every implementation.
    pub const ORDER: [StageKind; 5] = [
        Self::Contrast,
        Self::Saturation,
        Self::Shadows,
        Self::Highlights,
        Self::Temperature,
    ];

    /// Whether this stage changes anything for `params`.
    pub fn is_active(self, params: &ColorParams) -> bool {
        match self {
            Self::Contrast => params.contrast != 1.0,
            Self::Saturation => params.saturation != 1.0,
            Self::Shadows => params.shadows != 1.0,
            Self::Highlights => params.highlights != 1.0,
            Self::Temperature => params.temperature != 0.0,
        }
    }
}

/// Gamma applied by the shadows stage.
#[inline]
pub fn shadow_gamma(shadows: f32) -> f32 {
    1.0 / shadows.powf(constants::SHADOW_EXPONENT)
}

/// Uniform offset added by the highlights stage.
#[inline]
pub fn highlight_offset(highlights: f32) -> f32 {
    (highlights - 1.0) * constants::HIGHLIGHT_SCALE
}

/// Per-channel shift added by the temperature stage.
#[inline]
pub fn temperature_shift(temperature: f32) -> Vec3 {
    if temperature > 0.0 {
        constants::WARM_SHIFT * temperature
    } else if temperature < 0.0 {
        constants::COOL_SHIFT * temperature.abs()
    } else {
        Vec3::ZERO
    }
}

/// Adjust one normalized RGB triple.
///
/// Input and output components are in `[0, 1]`.
pub fn apply_rgb(rgb: Vec3, params: &ColorParams) -> Vec3 {
    StageKind::ORDER
        .iter()
        .filter(|kind| kind.is_active(params))
        .fold(rgb, |rgb, kind| apply_stage(*kind, rgb, params))
}

/// Apply a single stage.
pub fn apply_stage(kind: StageKind, rgb: Vec3, params: &ColorParams) -> Vec3 {
    ColorOp::for_stage(kind, params).apply(rgb)
}

/// One stage with its parameter-derived terms already computed.
///
/// This is where the per-pixel formulas live; the pipeline and [`apply_stage`] both go
/// through it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorOp {
    Contrast(f32),
    Saturation(f32),
    Gamma(f32),
    Offset(f32),
    Shift(Vec3),
}

impl ColorOp {
    pub fn for_stage(kind: StageKind, params: &ColorParams) -> Self {
        match kind {
            StageKind::Contrast => Self::Contrast(params.contrast),
            StageKind::Saturation => Self::Saturation(params.saturation),
            StageKind::Shadows => Self::Gamma(shadow_gamma(params.shadows)),
            StageKind::Highlights => Self::Offset(highlight_offset(params.highlights)),
            StageKind::Temperature => Self::Shift(temperature_shift(params.temperature)),
        }
    }

    #[inline]
    pub fn apply(self, rgb: Vec3) -> Vec3 {
        match self {
            Self::Contrast(c) => saturate(
                (rgb - Vec3::splat(constants::MIDPOINT)) * c + Vec3::splat(constants::MIDPOINT),
            ),
            Self::Saturation(s) => saturate(Vec3::splat(rgb.dot(constants::LUMA)).lerp(rgb, s)),
            // Stays within [0, 1] for inputs in range.
            Self::Gamma(g) => rgb.max(Vec3::ZERO).powf(g),
            Self::Offset(o) => saturate(rgb + Vec3::splat(o)),
            Self::Shift(shift) => saturate(rgb + shift),
        }
    }
}

#[inline]
fn saturate(rgb: Vec3) -> Vec3 {
    rgb.clamp(Vec3::ZERO, Vec3::ONE)
}
