//! Audio domain module

mod beat;
mod captured_audio;
mod recording_format;

pub use beat::BeatDescriptor;
pub use captured_audio::{CaptureSummary, CapturedAudio};
pub use recording_format::{RecordingFormat, DEFAULT_FORMAT_CANDIDATES};
