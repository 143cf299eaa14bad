//! Frame buffer type for video frames in CPU memory.
//!
//! Frames travel the pipeline as packed, tightly-strided RGBA8 so the same bytes can be
//! written to a GPU texture, handed to the CPU color loop and piped into the encoder
//! without any repacking.

use crate::error::{ClipFxError, Result};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A packed RGBA8 video frame.
///
/// One buffer is allocated per job and refilled for every frame; see
/// [`FrameBuffer::copy_from`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data, `width * height * 4` bytes, rows top to bottom
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; Self::byte_len(width, height)],
        }
    }

    /// Wrap existing RGBA8 bytes, checking the length.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(ClipFxError::InvalidParameter(format!(
                "RGBA buffer for {}x{} must be {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Number of bytes a `width x height` RGBA8 frame occupies.
    #[inline]
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Overwrite this buffer's pixels with `src`, reusing the allocation.
    pub fn copy_from(&mut self, src: &[u8]) -> Result<()> {
        if src.len() != self.data.len() {
            return Err(ClipFxError::InvalidParameter(format!(
                "frame copy size mismatch: got {} bytes, expected {}",
                src.len(),
                self.data.len()
            )));
        }
        self.data.copy_from_slice(src);
        Ok(())
    }

    /// Fill every pixel with one color.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Mean Rec.601 luma over all pixels, in `[0, 1]`.
    pub fn mean_luma(&self) -> f64 {
        let pixels = self.data.len() / BYTES_PER_PIXEL;
        if pixels == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64)
            .sum();
        sum / (pixels as f64 * 255.0)
    }

    /// Create a test pattern frame (color bars over a vertical ramp).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height);
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        for y in 0..height {
            // Darken toward the bottom so rows are distinguishable after a flip.
            let shade = 255 - (y * 191 / height.max(1)) as u16;
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x * 8 / width.max(1)) as usize;
                let color = colors[bar.min(7)];
                row[i] = (color[0] as u16 * shade / 255) as u8;
                row[i + 1] = (color[1] as u16 * shade / 255) as u8;
                row[i + 2] = (color[2] as u16 * shade / 255) as u8;
                row[i + 3] = 255;
            }
        }

        frame
    }
}
