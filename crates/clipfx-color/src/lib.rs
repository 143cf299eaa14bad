//! ClipFx Color - the color adjustment math and its CPU, WGSL and filter-graph forms.

pub mod adjust;
pub mod cpu;
pub mod error;
pub mod filtergraph;
pub mod pipeline;
pub mod shader;

pub use adjust::{apply_rgb, ColorOp, StageKind};
pub use cpu::{apply_in_place, CpuProcessor};
pub use error::ColorError;
pub use filtergraph::build_filter_graph;
pub use pipeline::AdjustPipeline;
pub use shader::{wgsl_source, ShaderUniforms};
