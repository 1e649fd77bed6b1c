//! Beat playback element
//!
//! Fetches the beat over HTTP (or from a local path), decodes it fully with
//! rodio and exposes the samples as a graph source that only advances while
//! playing.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rodio::{Decoder, Source};

use crate::application::ports::{BeatPlayer, CrossOrigin, HostError, MediaError, PcmSource};

/// Where a beat URL points
#[derive(Debug, Clone, PartialEq, Eq)]
enum BeatLocation {
    Remote(String),
    Local(PathBuf),
}

impl BeatLocation {
    fn parse(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote(url.to_string())
        } else if let Some(path) = url.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else {
            Self::Local(PathBuf::from(url))
        }
    }
}

#[derive(Debug, Default)]
struct Playback {
    position: usize,
    playing: bool,
}

/// Decoded beat audio
pub struct BeatPcm {
    channels: u16,
    sample_rate: u32,
    samples: Vec<f32>,
    playback: Mutex<Playback>,
}

impl BeatPcm {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate,
            samples,
            playback: Mutex::new(Playback::default()),
        }
    }

    /// Decode a complete media file
    pub fn decode(bytes: Vec<u8>) -> Result<Self, MediaError> {
        let decoder = Decoder::new(Cursor::new(bytes))
            .map_err(|e| MediaError::not_supported(format!("Unrecognized beat media: {}", e)))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.map(|s| f32::from(s) / 32768.0).collect();
        if samples.is_empty() {
            return Err(MediaError::decode("Beat media contains no audio"));
        }
        Ok(Self::new(channels, sample_rate, samples))
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (f64::from(self.channels) * f64::from(self.sample_rate))
    }

    fn with_playback(&self, f: impl FnOnce(&mut Playback)) {
        if let Ok(mut playback) = self.playback.lock() {
            f(&mut playback);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.lock().map(|p| p.playing).unwrap_or(false)
    }
}

impl PcmSource for BeatPcm {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&self, out: &mut [f32]) -> usize {
        let Ok(mut playback) = self.playback.lock() else {
            return 0;
        };
        if !playback.playing {
            return 0;
        }
        let start = playback.position.min(self.samples.len());
        let n = out.len().min(self.samples.len() - start);
        out[..n].copy_from_slice(&self.samples[start..start + n]);
        playback.position = start + n;
        // Playback ends with the media
        if playback.position >= self.samples.len() {
            playback.playing = false;
        }
        n
    }
}

/// Beat player backed by reqwest and rodio
pub struct NativeBeatPlayer {
    url: String,
    cross_origin: CrossOrigin,
    client: reqwest::Client,
    media: Mutex<Option<Arc<BeatPcm>>>,
    unloaded: AtomicBool,
}

impl NativeBeatPlayer {
    pub fn new(url: impl Into<String>, cross_origin: CrossOrigin, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            cross_origin,
            client,
            media: Mutex::new(None),
            unloaded: AtomicBool::new(false),
        }
    }

    async fn fetch(&self) -> Result<Vec<u8>, MediaError> {
        match BeatLocation::parse(&self.url) {
            BeatLocation::Remote(url) => {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| MediaError::network(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(MediaError::not_supported(format!(
                        "Beat request failed with HTTP {}",
                        status.as_u16()
                    )));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| MediaError::network(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            BeatLocation::Local(path) => tokio::fs::read(&path).await.map_err(|e| {
                MediaError::not_supported(format!("Cannot read {}: {}", path.display(), e))
            }),
        }
    }

    fn media(&self) -> Result<Arc<BeatPcm>, HostError> {
        self.media
            .lock()
            .ok()
            .and_then(|media| media.clone())
            .ok_or_else(|| HostError::Device("beat is not loaded".to_string()))
    }
}

#[async_trait]
impl BeatPlayer for NativeBeatPlayer {
    fn url(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<(), MediaError> {
        log::debug!("Loading beat {} ({:?})", self.url, self.cross_origin);
        let bytes = self.fetch().await?;
        let pcm = tokio::task::spawn_blocking(move || BeatPcm::decode(bytes))
            .await
            .map_err(|e| MediaError::decode(format!("Decode task failed: {}", e)))??;

        // A load that finishes after unload must not bring the media back
        if self.unloaded.load(Ordering::SeqCst) {
            return Err(MediaError::new(MediaError::ABORTED, "beat was unloaded"));
        }

        log::info!(
            "Beat ready: {:.1}s, {} ch @ {} Hz",
            pcm.duration_seconds(),
            pcm.channels,
            pcm.sample_rate
        );
        if let Ok(mut media) = self.media.lock() {
            *media = Some(Arc::new(pcm));
        }
        Ok(())
    }

    fn source(&self) -> Result<Arc<dyn PcmSource>, HostError> {
        let media: Arc<dyn PcmSource> = self.media()?;
        Ok(media)
    }

    fn seek_to_start(&self) -> Result<(), HostError> {
        self.media()?.with_playback(|p| p.position = 0);
        Ok(())
    }

    fn play(&self) -> Result<(), HostError> {
        self.media()?.with_playback(|p| p.playing = true);
        Ok(())
    }

    fn pause(&self) -> Result<(), HostError> {
        if let Ok(media) = self.media() {
            media.with_playback(|p| p.playing = false);
        }
        Ok(())
    }

    fn unload(&self) -> Result<(), HostError> {
        self.unloaded.store(true, Ordering::SeqCst);
        if let Ok(mut media) = self.media.lock() {
            if let Some(pcm) = media.take() {
                pcm.with_playback(|p| p.playing = false);
            }
        }
        Ok(())
    }
}
