//! Beat descriptor supplied by the beat-selection collaborator

use serde::{Deserialize, Serialize};

/// A selectable instrumental. Volume-independent metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatDescriptor {
    pub id: String,
    pub title: String,
    pub audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u16>,
}

impl BeatDescriptor {
    /// Describe a beat known only by its URL
    pub fn from_url(audio_url: impl Into<String>) -> Self {
        let audio_url = audio_url.into();
        let title = audio_url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("beat")
            .to_string();
        Self {
            id: audio_url.clone(),
            title,
            audio_url,
            producer: None,
            bpm: None,
        }
    }

    /// Same beat means same identifier and same audio source
    pub fn is_same_beat(&self, other: &BeatDescriptor) -> bool {
        self.id == other.id && self.audio_url == other.audio_url
    }
}
