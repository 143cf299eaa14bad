//! CPU fallback: the adjustment applied to packed RGBA8 in place.
//!
//! Each pixel is normalized to `[0, 1]`, run through the same stage chain the shader and
//! the filter graph use, then rounded back to 8 bits. Alpha is left alone.

use crate::error::ColorError;
use crate::pipeline::AdjustPipeline;
use clipfx_core::{ColorParams, FrameBuffer};
use glam::Vec3;
use rayon::prelude::*;
use tracing::trace;

/// Pixels per parallel work item.
const CHUNK_PIXELS: usize = 16 * 1024;

/// Apply the color adjustment to an RGBA8 buffer in place.
pub fn apply_in_place(rgba: &mut [u8], params: &ColorParams) -> Result<(), ColorError> {
    if rgba.len() % 4 != 0 {
        return Err(ColorError::UnalignedBuffer(rgba.len()));
    }
    let pipeline = AdjustPipeline::from_params(params);
    if pipeline.is_identity() {
        return Ok(());
    }

    rgba.par_chunks_mut(CHUNK_PIXELS * 4).for_each(|chunk| {
        for px in chunk.chunks_exact_mut(4) {
            let rgb = Vec3::new(
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            );
            let out = pipeline.process_pixel(rgb);
            px[0] = to_u8(out.x);
            px[1] = to_u8(out.y);
            px[2] = to_u8(out.z);
        }
    });
    Ok(())
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Frame-level wrapper around [`apply_in_place`] that counts its work.
#[derive(Debug, Default)]
pub struct CpuProcessor {
    frames_processed: u64,
}

impl CpuProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust a whole frame in place.
    pub fn process(&mut self, frame: &mut FrameBuffer, params: &ColorParams) -> Result<(), ColorError> {
        let expected = FrameBuffer::byte_len(frame.width, frame.height);
        if frame.data.len() != expected {
            return Err(ColorError::DimensionMismatch {
                expected,
                got: frame.data.len(),
            });
        }
        apply_in_place(&mut frame.data, params)?;
        self.frames_processed += 1;
        trace!(frame = self.frames_processed, "cpu color pass");
        Ok(())
    }

    /// Frames adjusted so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}
