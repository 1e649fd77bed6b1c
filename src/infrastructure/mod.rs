//! Infrastructure layer - Adapter implementations
//!
//! Concrete implementations of the port interfaces: the native audio host,
//! the HTTP API clients and the XDG config store.

pub mod api;
pub mod audio;
pub mod config;

// Re-export adapters
pub use api::{HttpBeatCatalog, HttpRecordingApi};
pub use audio::{NativeAudioHost, NativeHostConfig};
pub use config::XdgConfigStore;
