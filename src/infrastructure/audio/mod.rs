//! Native audio backend
//!
//! Implements the audio host port on top of cpal (devices), rodio (beat
//! decoding), rubato (rate conversion) and flacenc/hound (capture containers).

mod beat_player;
mod context;
pub mod encoder;
mod microphone;
mod native_host;
pub mod processing;
mod recorder;
pub mod render;
mod resample;

pub use beat_player::{BeatPcm, NativeBeatPlayer};
pub use context::{NativeAudioContext, FALLBACK_SAMPLE_RATE};
pub use microphone::CpalMicrophone;
pub use native_host::{NativeAudioHost, NativeHostConfig};
pub use recorder::NativeCaptureRecorder;
pub use resample::{resample_interleaved, ResampledSource};
