//! Application layer - Use cases and port interfaces
//!
//! Contains the audio engine, the session controller, device negotiation,
//! the submission bridge and the trait definitions for external systems.

pub mod controller;
pub mod engine;
pub mod negotiation;
pub mod ports;
pub mod submission;

// Re-export use cases
pub use controller::{ControllerError, ControllerOptions, RecordingSessionController};
pub use engine::{AudioEngine, AudioGraphHandle, EngineOptions, GraphParts, MonoFold};
pub use negotiation::DeviceNegotiator;
pub use submission::SubmissionBridge;
