//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod audio_host;
pub mod catalog;
pub mod config;
pub mod submission;

// Re-export common types
pub use audio_host::{
    AudioContext, AudioHost, BeatPlayer, CaptureDelivery, CaptureRecorder, CaptureResult,
    ContextState, CrossOrigin, HostEnvironment, HostError, MediaError, MicrophoneStream, NodeId,
    PcmSource, PendingCapture, RecorderOptions,
};
pub use catalog::{BeatCatalog, CatalogError};
pub use config::ConfigStore;
pub use submission::{
    CreateRecordingRequest, RecordingApi, SubmissionError, SubmissionFailure, SubmissionMetadata,
    SubmissionStep, UploadTicket,
};
