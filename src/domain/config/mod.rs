//! Configuration domain module

mod app_config;

pub use app_config::{AppConfig, ClientConfig, DEFAULT_API_URL, DEFAULT_BEAT_VOLUME};
