//! Domain layer - Core business logic
//!
//! Contains value objects, the recording session state machine, and domain errors.
//! This layer has no dependencies on external systems.

pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod session;

// Re-export common types
pub use audio::{BeatDescriptor, CapturedAudio, RecordingFormat};
pub use config::AppConfig;
pub use device::{ClientHints, ConstraintProfile, FormFactor, InputDeviceOption};
pub use error::*;
pub use session::{Phase, RecordingLimits, RecordingSession, SessionEvent, SessionSnapshot};
