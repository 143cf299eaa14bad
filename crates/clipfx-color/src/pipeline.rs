//! Color adjustment pipeline: the active stages for one parameter set, precomputed.
//!
//! [`crate::adjust::apply_rgb`] derives gamma and shifts on every call; the per-pixel
//! loop instead builds an [`AdjustPipeline`] of [`ColorOp`]s once per frame and reuses it.

use crate::adjust::{ColorOp, StageKind};
use clipfx_core::ColorParams;
use glam::Vec3;

/// The active stages for a parameter set, in application order.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustPipeline {
    pub ops: Vec<ColorOp>,
}

impl AdjustPipeline {
    /// Build the stage chain for `params`; neutral stages are left out.
    pub fn from_params(params: &ColorParams) -> Self {
        let ops = StageKind::ORDER
            .iter()
            .filter(|kind| kind.is_active(params))
            .map(|kind| ColorOp::for_stage(*kind, params))
            .collect();
        Self { ops }
    }

    /// True when the pipeline leaves every pixel unchanged.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Process a single pixel through the pipeline.
    #[inline]
    pub fn process_pixel(&self, rgb: Vec3) -> Vec3 {
        self.ops.iter().fold(rgb, |rgb, op| op.apply(rgb))
    }

    /// Process a batch of pixels.
    pub fn process_buffer(&self, data: &mut [Vec3]) {
        for pixel in data.iter_mut() {
            *pixel = self.process_pixel(*pixel);
        }
    }
}
