//! Captured audio value object

use super::RecordingFormat;

/// A finished recording: container bytes, negotiated format and duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    payload: Vec<u8>,
    format: RecordingFormat,
    duration_seconds: u32,
}

/// Lightweight description of a capture, safe to clone into snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub mime_type: String,
    pub size_bytes: usize,
    pub duration_seconds: u32,
}

impl CapturedAudio {
    /// Create captured audio from an assembled payload
    pub fn new(payload: Vec<u8>, format: RecordingFormat, duration_seconds: u32) -> Self {
        Self {
            payload,
            format,
            duration_seconds,
        }
    }

    /// Assemble emitted chunks, in order, into one payload
    pub fn assemble(chunks: Vec<Vec<u8>>, format: RecordingFormat, duration_seconds: u32) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(total);
        for chunk in chunks {
            payload.extend_from_slice(&chunk);
        }
        Self::new(payload, format, duration_seconds)
    }

    /// Get the raw payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume and return the raw payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Get the negotiated format
    pub fn format(&self) -> &RecordingFormat {
        &self.format
    }

    /// MIME type string including codec parameter
    pub fn mime_type(&self) -> String {
        self.format.mime_type()
    }

    /// Recorded duration in whole seconds
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Check whether any audio bytes were captured
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Summary used by snapshots and the submission request
    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            mime_type: self.mime_type(),
            size_bytes: self.size_bytes(),
            duration_seconds: self.duration_seconds,
        }
    }
}
