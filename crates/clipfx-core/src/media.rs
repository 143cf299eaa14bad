//! Input files, output blobs and the probed description of a source video.

use crate::time::FrameRate;
use std::path::Path;
use std::sync::Arc;

/// MIME type of everything the pipeline produces.
pub const MP4_MIME: &str = "video/mp4";

/// An input file held in memory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Original file name, used only to pick a container extension.
    pub name: String,
    /// File contents.
    pub data: Arc<[u8]>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk.
    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.mp4".to_string());
        Ok(Self::new(name, data))
    }

    /// Lower-cased extension of the file name, defaulting to `mp4`.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "mp4".to_string())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A produced video in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl MediaBlob {
    /// An MP4 blob.
    pub fn mp4(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: MP4_MIME.to_string(),
        }
    }

    /// A byte-identical copy of the input, tagged with the input's type.
    pub fn copy_of(file: &MediaFile) -> Self {
        let mime_type = match file.extension().as_str() {
            "webm" => "video/webm",
            "mov" => "video/quicktime",
            "mkv" => "video/x-matroska",
            _ => MP4_MIME,
        };
        Self {
            data: file.data.to_vec(),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Probed description of a source video, fixed for the duration of a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMedia {
    pub width: u32,
    pub height: u32,
    /// Duration in seconds.
    pub duration: f64,
    pub frame_rate: FrameRate,
}

/// Encoder output collected as it streams in.
///
/// The final size is unknown up front, so chunks are kept in order and their total is
/// tracked as they arrive.
#[derive(Debug, Default)]
pub struct JobOutput {
    chunks: Vec<Vec<u8>>,
    total_len: usize,
}

impl JobOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next chunk. Empty chunks are ignored.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_len += chunk.len();
        self.chunks.push(chunk);
    }

    /// Bytes received so far.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Concatenate all chunks into one contiguous buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out
    }
}
