//! Audio platform port interfaces
//!
//! The engine talks to the audio platform through these traits: a host that
//! creates contexts, beat players and microphone streams, and a context that
//! owns a node graph feeding a capture recorder.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::audio::RecordingFormat;
use crate::domain::device::{ConstraintProfile, InputDeviceOption};

/// Audio platform errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No input device available: {0}")]
    NoDevice(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio context is closed")]
    ContextClosed,

    #[error("Unknown audio node: {0}")]
    UnknownNode(NodeId),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Audio backend error: {0}")]
    Backend(String),
}

/// Beat media errors, numbered like HTML media error codes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Media error{}: {message}", code.map(|c| format!(" {}", c)).unwrap_or_default())]
pub struct MediaError {
    pub code: Option<u16>,
    pub message: String,
}

impl MediaError {
    pub const ABORTED: u16 = 1;
    pub const NETWORK: u16 = 2;
    pub const DECODE: u16 = 3;
    pub const SRC_NOT_SUPPORTED: u16 = 4;

    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(Self::NETWORK, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(Self::DECODE, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(Self::SRC_NOT_SUPPORTED, message)
    }
}

/// Handle to a node inside an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Audio context lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Credential mode used when fetching beat media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossOrigin {
    /// Fetched without ambient credentials, still readable by the graph
    #[default]
    Anonymous,
    UseCredentials,
}

/// What the host can do in its current execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEnvironment {
    pub secure_transport: bool,
    pub capture_supported: bool,
}

/// Options for binding a capture recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub format: RecordingFormat,
    pub bits_per_second: u32,
}

/// Interleaved f32 sample source feeding a graph node
pub trait PcmSource: Send + Sync {
    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Fill `out` with interleaved samples, returning how many were written.
    /// Unwritten samples are treated as silence.
    fn read(&self, out: &mut [f32]) -> usize;
}

/// Chunks delivered by a stopped recorder
pub type CaptureResult = Result<Vec<Vec<u8>>, HostError>;

/// Finalization in flight after a recorder is stopped
#[derive(Debug)]
pub struct PendingCapture {
    rx: oneshot::Receiver<CaptureResult>,
}

/// Sending half of a `PendingCapture`
#[derive(Debug)]
pub struct CaptureDelivery {
    tx: oneshot::Sender<CaptureResult>,
}

impl PendingCapture {
    /// Create a linked delivery/pending pair
    pub fn channel() -> (CaptureDelivery, PendingCapture) {
        let (tx, rx) = oneshot::channel();
        (CaptureDelivery { tx }, PendingCapture { rx })
    }

    /// A capture that is already finalized
    pub fn ready(result: CaptureResult) -> Self {
        let (delivery, pending) = Self::channel();
        delivery.deliver(result);
        pending
    }

    /// Wait for the recorder to deliver its chunks
    pub async fn wait(self) -> CaptureResult {
        self.rx.await.unwrap_or_else(|_| {
            Err(HostError::Backend(
                "recorder dropped before delivering chunks".to_string(),
            ))
        })
    }
}

impl CaptureDelivery {
    pub fn deliver(self, result: CaptureResult) {
        // Receiver may already be gone after a forced teardown
        let _ = self.tx.send(result);
    }
}

/// Port for the audio platform
#[async_trait]
pub trait AudioHost: Send + Sync {
    /// Report transport security and capture capability
    fn environment(&self) -> HostEnvironment;

    /// Create a new audio processing context
    async fn create_context(&self) -> Result<Box<dyn AudioContext>, HostError>;

    /// Create a playback element bound to one beat URL
    fn create_beat_player(
        &self,
        url: &str,
        cross_origin: CrossOrigin,
    ) -> Result<Box<dyn BeatPlayer>, HostError>;

    /// Request generic microphone permission, unlocking device labels
    async fn request_permission(&self) -> Result<(), HostError>;

    /// List audio input devices
    async fn enumerate_input_devices(&self) -> Result<Vec<InputDeviceOption>, HostError>;

    /// Acquire a microphone stream under a constraint profile
    async fn open_microphone(
        &self,
        profile: &ConstraintProfile,
    ) -> Result<Box<dyn MicrophoneStream>, HostError>;

    /// Whether a capture recorder can produce this MIME type
    fn is_format_supported(&self, mime_type: &str) -> bool;
}

/// Port for an audio processing context and its node graph
#[async_trait]
pub trait AudioContext: Send + Sync {
    fn state(&self) -> ContextState;

    async fn resume(&self) -> Result<(), HostError>;

    fn sample_rate(&self) -> u32;

    /// Node reading from a PCM source
    fn create_source(&self, source: Arc<dyn PcmSource>) -> Result<NodeId, HostError>;

    fn create_gain(&self, gain: f32) -> Result<NodeId, HostError>;

    /// Node splitting its input into `outputs` mono outputs
    fn create_splitter(&self, outputs: usize) -> Result<NodeId, HostError>;

    /// Node merging `inputs` inputs into one channel each
    fn create_merger(&self, inputs: usize) -> Result<NodeId, HostError>;

    /// Node whose input is what the recorder captures
    fn create_mixdown(&self) -> Result<NodeId, HostError>;

    /// Local monitoring destination
    fn monitor_output(&self) -> NodeId;

    fn connect(&self, from: NodeId, output: usize, to: NodeId, input: usize)
        -> Result<(), HostError>;

    /// Remove every outgoing connection of a node
    fn disconnect(&self, node: NodeId) -> Result<(), HostError>;

    /// Schedule an exponential approach of a gain node towards `target`
    fn ramp_gain(&self, node: NodeId, target: f32, time_constant: f32) -> Result<(), HostError>;

    /// Bind a capture recorder to a mixdown node
    fn create_recorder(
        &self,
        mixdown: NodeId,
        options: &RecorderOptions,
    ) -> Result<Box<dyn CaptureRecorder>, HostError>;

    async fn close(&self) -> Result<(), HostError>;
}

/// Port for a beat playback element
#[async_trait]
pub trait BeatPlayer: Send + Sync {
    fn url(&self) -> &str;

    /// Load the beat and resolve once it is fully playable
    async fn load(&self) -> Result<(), MediaError>;

    /// Samples of the loaded beat, following the play position
    fn source(&self) -> Result<Arc<dyn PcmSource>, HostError>;

    fn seek_to_start(&self) -> Result<(), HostError>;

    fn play(&self) -> Result<(), HostError>;

    fn pause(&self) -> Result<(), HostError>;

    /// Drop the media and unbind from the URL
    fn unload(&self) -> Result<(), HostError>;
}

/// Port for an acquired microphone stream
pub trait MicrophoneStream: Send + Sync {
    /// Number of live audio tracks
    fn track_count(&self) -> usize;

    /// Channels reported by the input device
    fn channel_count(&self) -> u16;

    fn label(&self) -> String;

    fn source(&self) -> Arc<dyn PcmSource>;

    /// Stop every track, releasing the device
    fn stop_tracks(&self) -> Result<(), HostError>;
}

/// Port for a capture recorder bound to a mixdown node
pub trait CaptureRecorder: Send + Sync {
    fn format(&self) -> &RecordingFormat;

    /// Begin capture, emitting a chunk every `timeslice`
    fn start(&self, timeslice: Duration) -> Result<(), HostError>;

    /// Halt capture; chunks are delivered through the pending capture
    fn stop(&self) -> Result<PendingCapture, HostError>;

    fn is_recording(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_capture_resolves() {
        let pending = PendingCapture::ready(Ok(vec![vec![1, 2], vec![3]]));
        assert_eq!(pending.wait().await.unwrap(), vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn dropped_delivery_is_an_error() {
        let (delivery, pending) = PendingCapture::channel();
        drop(delivery);
        assert!(matches!(pending.wait().await, Err(HostError::Backend(_))));
    }

    #[test]
    fn media_error_display_includes_code() {
        let err = MediaError::network("timed out");
        assert_eq!(err.to_string(), "Media error 2: timed out");
        let bare = MediaError {
            code: None,
            message: "unknown".into(),
        };
        assert_eq!(bare.to_string(), "Media error: unknown");
    }
}
