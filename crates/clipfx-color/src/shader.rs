//! WGSL form of the adjustment.
//!
//! The fragment body is generated stage by stage from [`StageKind::ORDER`] with the
//! constants of [`crate::adjust::constants`] spliced in, so the shader cannot drift from
//! the CPU math. Parameters arrive through a uniform block laid out as [`ShaderUniforms`].

use crate::adjust::{constants, StageKind};
use bytemuck::{Pod, Zeroable};
use clipfx_core::ColorParams;
use glam::Vec3;
use std::fmt::Write as _;

/// Uniform block consumed by the color shader. Padded to 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderUniforms {
    pub contrast: f32,
    pub saturation: f32,
    pub temperature: f32,
    pub shadows: f32,
    pub highlights: f32,
    pub _pad: [f32; 3],
}

impl From<&ColorParams> for ShaderUniforms {
    fn from(p: &ColorParams) -> Self {
        Self {
            contrast: p.contrast,
            saturation: p.saturation,
            temperature: p.temperature,
            shadows: p.shadows,
            highlights: p.highlights,
            _pad: [0.0; 3],
        }
    }
}

/// Entry point of the vertex stage.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point of the fragment stage.
pub const FRAGMENT_ENTRY: &str = "fs_main";

const PRELUDE: &str = r#"struct Params {
    contrast: f32,
    saturation: f32,
    temperature: f32,
    shadows: f32,
    highlights: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var src_tex: texture_2d<f32>;
@group(0) @binding(1) var<uniform> params: Params;

// Fullscreen triangle. Clip-space y points up while texture rows run downward, so the
// top of the clip volume is mapped to row 0 and read-back rows come out top to bottom.
@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> @builtin(position) vec4<f32> {
    let x = f32((idx << 1u) & 2u);
    let y = f32(idx & 2u);
    return vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = textureLoad(src_tex, vec2<i32>(floor(frag.xy)), 0);
    var rgb = texel.rgb;
"#;

const EPILOGUE: &str = r#"    return vec4<f32>(rgb, texel.a);
}
"#;

fn vec3_literal(v: Vec3) -> String {
    format!("vec3<f32>({:?}, {:?}, {:?})", v.x, v.y, v.z)
}

fn stage_snippet(kind: StageKind) -> String {
    let zero = "vec3<f32>(0.0)";
    let one = "vec3<f32>(1.0)";
    match kind {
        StageKind::Contrast => format!(
            "    // contrast\n    rgb = clamp((rgb - vec3<f32>({mid:?})) * params.contrast + vec3<f32>({mid:?}), {zero}, {one});\n",
            mid = constants::MIDPOINT,
        ),
        StageKind::Saturation => format!(
            "    // saturation\n    let gray = dot(rgb, {luma});\n    rgb = clamp(mix(vec3<f32>(gray), rgb, params.saturation), {zero}, {one});\n",
            luma = vec3_literal(constants::LUMA),
        ),
        StageKind::Shadows => format!(
            "    // shadows\n    if (params.shadows != 1.0) {{\n        let gamma = 1.0 / pow(params.shadows, {exp:?});\n        let base = max(rgb, {zero});\n        rgb = select(pow(base, vec3<f32>(gamma)), {zero}, base <= {zero});\n    }}\n",
            exp = constants::SHADOW_EXPONENT,
        ),
        StageKind::Highlights => format!(
            "    // highlights\n    if (params.highlights != 1.0) {{\n        rgb = clamp(rgb + vec3<f32>((params.highlights - 1.0) * {scale:?}), {zero}, {one});\n    }}\n",
            scale = constants::HIGHLIGHT_SCALE,
        ),
        StageKind::Temperature => format!(
            "    // temperature\n    if (params.temperature > 0.0) {{\n        rgb = clamp(rgb + {warm} * params.temperature, {zero}, {one});\n    }} else if (params.temperature < 0.0) {{\n        rgb = clamp(rgb + {cool} * abs(params.temperature), {zero}, {one});\n    }}\n",
            warm = vec3_literal(constants::WARM_SHIFT),
            cool = vec3_literal(constants::COOL_SHIFT),
        ),
    }
}

/// Full WGSL module (vertex + fragment) for the color pass.
pub fn wgsl_source() -> String {
    let mut src = String::from(PRELUDE);
    for kind in StageKind::ORDER {
        let _ = write!(src, "{}", stage_snippet(kind));
    }
    src.push_str(EPILOGUE);
    src
}
