//! Helpers shared by the piped ffmpeg/ffprobe processes.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;

/// Lines of stderr kept for error messages.
const TAIL_LINES: usize = 12;

/// How long to wait for the last stderr lines once a process has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub fn ffmpeg_path() -> PathBuf {
    ffmpeg_sidecar::paths::ffmpeg_path()
}

/// ffprobe lives next to ffmpeg, both when installed and when downloaded.
pub fn ffprobe_path() -> PathBuf {
    let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    let ffmpeg = ffmpeg_path();
    if ffmpeg.parent().map_or(true, |p| p.as_os_str().is_empty()) {
        PathBuf::from(name)
    } else {
        ffmpeg.with_file_name(name)
    }
}

/// The last few stderr lines of a child process, collected in the background.
#[derive(Debug, Default)]
pub struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    reader: Option<JoinHandle<()>>,
}

impl StderrTail {
    /// Start draining `stderr`. The task ends when the process closes the pipe.
    pub fn spawn(stderr: ChildStderr) -> Self {
        let lines = Arc::new(Mutex::new(VecDeque::new()));
        let sink = lines.clone();
        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let mut lines = sink.lock();
                if lines.len() == TAIL_LINES {
                    lines.pop_front();
                }
                lines.push_back(line);
            }
        });
        Self {
            lines,
            reader: Some(reader),
        }
    }

    /// Wait for the reader to see the end of the pipe, so an exited process's last words
    /// are in the tail.
    pub async fn drain(&mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = tokio::time::timeout(DRAIN_TIMEOUT, reader).await;
        }
    }

    pub fn text(&self) -> String {
        self.lines.lock().iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl Drop for StderrTail {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Human-readable failure description for a finished process.
pub fn describe_exit(what: &str, status: ExitStatus, tail: &StderrTail) -> String {
    let text = tail.text();
    if text.is_empty() {
        format!("{what} exited with {status}")
    } else {
        format!("{what} exited with {status}: {text}")
    }
}
