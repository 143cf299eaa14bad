//! ClipFx GPU - wgpu-based color pass
//!
//! A headless device renders each frame through the generated color shader into an
//! offscreen target and reads the pixels back in top-to-bottom row order.

pub mod context;
pub mod error;
pub mod renderer;
pub mod texture;

pub use context::GpuContext;
pub use error::GpuError;
pub use renderer::ColorRenderer;
pub use texture::{GpuTexture, ReadbackBuffer};
