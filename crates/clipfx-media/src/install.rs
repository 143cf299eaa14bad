//! Locating, or downloading, the ffmpeg binaries.

use clipfx_core::{ClipFxError, Result};
use tracing::{debug, info};

/// Make sure ffmpeg can be run, downloading a static build when allowed.
///
/// Runs on the blocking pool: the presence check spawns a process and the download is
/// synchronous.
pub async fn ensure_ffmpeg(auto_download: bool) -> Result<()> {
    tokio::task::spawn_blocking(move || ensure_ffmpeg_blocking(auto_download))
        .await
        .map_err(|e| ClipFxError::BackendUnavailable(format!("ffmpeg check failed: {e}")))?
}

fn ensure_ffmpeg_blocking(auto_download: bool) -> Result<()> {
    if ffmpeg_sidecar::command::ffmpeg_is_installed() {
        debug!("FFmpeg is already installed");
        return Ok(());
    }
    if !auto_download {
        return Err(ClipFxError::BackendUnavailable(
            "ffmpeg not found and automatic download is disabled".into(),
        ));
    }

    info!("FFmpeg not found, downloading...");
    ffmpeg_sidecar::download::auto_download()
        .map_err(|e| ClipFxError::BackendUnavailable(format!("failed to download FFmpeg: {e}")))?;
    info!("FFmpeg downloaded successfully");
    Ok(())
}
