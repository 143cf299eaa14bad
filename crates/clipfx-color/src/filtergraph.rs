//! The adjustment expressed as an ffmpeg filter graph.
//!
//! Color runs through `geq` on planar RGB. Each channel expression carries the whole stage
//! chain as a register program: `st(0..2)` hold normalized r/g/b, every active stage
//! rewrites them in [`StageKind::ORDER`], and the channel finally loads its own register.
//! Retiming follows as `setpts`, plus `fps` when an output rate is pinned, so a single `-vf`
//! pass does color first and speed second.

use crate::adjust::{constants, highlight_offset, shadow_gamma, temperature_shift, StageKind};
use clipfx_core::{ColorParams, FilterParams, FrameRate};

/// Register holding the luma term during the saturation stage.
const GRAY_REG: usize = 3;
const CHANNELS: [(&str, &str); 3] = [("r", "r(X,Y)"), ("g", "g(X,Y)"), ("b", "b(X,Y)")];

/// Register program shared by all three `geq` channel expressions.
///
/// Returns `None` when every color stage is neutral.
pub fn color_program(params: &ColorParams) -> Option<String> {
    let stages: Vec<StageKind> = StageKind::ORDER
        .into_iter()
        .filter(|kind| kind.is_active(params))
        .collect();
    if stages.is_empty() {
        return None;
    }

    let mut stmts: Vec<String> = CHANNELS
        .iter()
        .enumerate()
        .map(|(reg, (_, sample))| format!("st({reg},{sample}/255)"))
        .collect();

    for kind in stages {
        match kind {
            StageKind::Contrast => {
                let c = params.contrast;
                let mid = constants::MIDPOINT;
                for reg in 0..3 {
                    stmts.push(format!("st({reg},clip((ld({reg})-{mid})*{c}+{mid},0,1))"));
                }
            }
            StageKind::Saturation => {
                let luma = constants::LUMA;
                stmts.push(format!(
                    "st({GRAY_REG},{}*ld(0)+{}*ld(1)+{}*ld(2))",
                    luma.x, luma.y, luma.z
                ));
                let s = params.saturation;
                for reg in 0..3 {
                    stmts.push(format!(
                        "st({reg},clip(ld({GRAY_REG})+(ld({reg})-ld({GRAY_REG}))*{s},0,1))"
                    ));
                }
            }
            StageKind::Shadows => {
                let gamma = shadow_gamma(params.shadows);
                for reg in 0..3 {
                    stmts.push(format!("st({reg},pow(max(ld({reg}),0),{gamma}))"));
                }
            }
            StageKind::Highlights => {
                let offset = highlight_offset(params.highlights);
                for reg in 0..3 {
                    stmts.push(format!("st({reg},clip(ld({reg})+({offset}),0,1))"));
                }
            }
            StageKind::Temperature => {
                let shift = temperature_shift(params.temperature).to_array();
                for (reg, delta) in shift.iter().enumerate() {
                    stmts.push(format!("st({reg},clip(ld({reg})+({delta}),0,1))"));
                }
            }
        }
    }
    Some(stmts.join(";"))
}

/// `geq` filter for the color stage, wrapped in the pixel-format conversions it needs.
///
/// `geq` truncates when storing, so each channel adds 0.5 before the store to round the
/// same way the CPU path does.
pub fn color_filter(params: &ColorParams) -> Option<String> {
    let program = color_program(params)?;
    let channels: Vec<String> = CHANNELS
        .iter()
        .enumerate()
        .map(|(reg, (name, _))| format!("{name}='{program};ld({reg})*255+0.5'"))
        .collect();
    Some(format!("format=gbrp,geq={},format=yuv420p", channels.join(":")))
}

/// Retime stage: rescale presentation timestamps, then resample to `rate` if one is given.
///
/// Without a rate the stream keeps its source rate and ffmpeg's constant-rate muxing drops
/// or repeats frames to fill it.
pub fn retime_filter(speed: f32, rate: Option<FrameRate>) -> Option<String> {
    if speed == 1.0 {
        return None;
    }
    Some(match rate {
        Some(rate) => format!("setpts=PTS/{speed},fps={}", rate.as_ffmpeg_arg()),
        None => format!("setpts=PTS/{speed}"),
    })
}

/// Complete `-vf` argument for a job, or `None` when the job is the identity transform.
pub fn build_filter_graph(params: &FilterParams, rate: Option<FrameRate>) -> Option<String> {
    let stages: Vec<String> = [
        color_filter(&params.color),
        retime_filter(params.speed, rate),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!stages.is_empty()).then(|| stages.join(","))
}
