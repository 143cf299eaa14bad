//! Media file probing to get metadata without full decode.

use crate::process::ffprobe_path;
use clipfx_core::{ClipFxError, FrameRate, Result, SourceMedia};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Fallback when ffprobe reports no usable rate.
const DEFAULT_RATE: FrameRate = FrameRate::FPS_30;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_seconds(text: Option<&String>) -> Option<f64> {
    text.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Interpret `ffprobe -of json` output for the first video stream.
pub fn parse_probe_json(json: &str) -> Result<SourceMedia> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| ClipFxError::Probe(format!("unreadable ffprobe output: {e}")))?;

    let stream = output
        .streams
        .first()
        .ok_or_else(|| ClipFxError::Probe("no video stream".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ClipFxError::Probe("video stream has no dimensions".into())),
    };

    // Stream duration first; some containers only carry it at the format level.
    let duration = parse_seconds(stream.duration.as_ref())
        .or_else(|| parse_seconds(output.format.as_ref().and_then(|f| f.duration.as_ref())))
        .ok_or_else(|| ClipFxError::Probe("unknown duration".into()))?;

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(FrameRate::parse)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(FrameRate::parse))
        .unwrap_or(DEFAULT_RATE);

    Ok(SourceMedia {
        width,
        height,
        duration,
        frame_rate,
    })
}

/// Probe a media file with ffprobe.
pub async fn probe_file(path: &Path) -> Result<SourceMedia> {
    if !path.exists() {
        return Err(ClipFxError::Probe(format!("file not found: {}", path.display())));
    }

    let output = Command::new(ffprobe_path())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ClipFxError::Probe(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ClipFxError::Probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let media = parse_probe_json(&String::from_utf8_lossy(&output.stdout))?;
    debug!(
        width = media.width,
        height = media.height,
        duration = media.duration,
        fps = media.frame_rate.to_fps_f64(),
        "probed source"
    );
    Ok(media)
}
