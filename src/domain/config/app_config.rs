//! Application configuration value object

use serde::{Deserialize, Serialize};

use crate::domain::audio::RecordingFormat;
use crate::domain::device::ClientHints;

/// Default recordings API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Default beat volume (0-100)
pub const DEFAULT_BEAT_VOLUME: u8 = 70;

/// Client hints used for form-factor classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub viewport_width: Option<u32>,
    pub user_agent: Option<String>,
    pub touch_points: Option<u32>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub performer: Option<String>,
    pub beat_volume: Option<u8>,
    pub force_mono: Option<bool>,
    pub monitor_microphone: Option<bool>,
    pub input_device: Option<String>,
    pub formats: Option<Vec<String>>,
    pub beat_load_timeout: Option<u64>,
    pub client: Option<ClientConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            api_url: Some(DEFAULT_API_URL.to_string()),
            token: None,
            performer: None,
            beat_volume: Some(DEFAULT_BEAT_VOLUME),
            force_mono: Some(false),
            monitor_microphone: Some(false),
            input_device: None,
            formats: None,
            beat_load_timeout: Some(30),
            client: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_url: other.api_url.or(self.api_url),
            token: other.token.or(self.token),
            performer: other.performer.or(self.performer),
            beat_volume: other.beat_volume.or(self.beat_volume),
            force_mono: other.force_mono.or(self.force_mono),
            monitor_microphone: other.monitor_microphone.or(self.monitor_microphone),
            input_device: other.input_device.or(self.input_device),
            formats: other.formats.or(self.formats),
            beat_load_timeout: other.beat_load_timeout.or(self.beat_load_timeout),
            client: Self::merge_client_config(self.client, other.client),
        }
    }

    fn merge_client_config(
        base: Option<ClientConfig>,
        other: Option<ClientConfig>,
    ) -> Option<ClientConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(ClientConfig {
                viewport_width: o.viewport_width.or(b.viewport_width),
                user_agent: o.user_agent.or(b.user_agent),
                touch_points: o.touch_points.or(b.touch_points),
            }),
        }
    }

    pub fn api_url_or_default(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Beat volume clamped to 0-100
    pub fn beat_volume_or_default(&self) -> u8 {
        self.beat_volume.unwrap_or(DEFAULT_BEAT_VOLUME).min(100)
    }

    pub fn force_mono_or_default(&self) -> bool {
        self.force_mono.unwrap_or(false)
    }

    pub fn monitor_microphone_or_default(&self) -> bool {
        self.monitor_microphone.unwrap_or(false)
    }

    pub fn beat_load_timeout_or_default(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.beat_load_timeout.unwrap_or(30).max(1))
    }

    /// Configured candidate formats, or the built-in list when unset or unusable
    pub fn formats_or_default(&self) -> Vec<RecordingFormat> {
        let parsed = self
            .formats
            .as_deref()
            .map(|formats| RecordingFormat::parse_candidates(formats))
            .unwrap_or_default();
        if parsed.is_empty() {
            RecordingFormat::default_candidates()
        } else {
            parsed
        }
    }

    /// Client hints for form-factor classification
    pub fn client_hints(&self) -> ClientHints {
        let client = self.client.clone().unwrap_or_default();
        ClientHints {
            viewport_width: client.viewport_width,
            user_agent: client.user_agent,
            max_touch_points: client.touch_points,
        }
    }
}
