//! Native audio host backed by cpal, rodio and reqwest

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::application::ports::{
    AudioContext, AudioHost, BeatPlayer, CrossOrigin, HostEnvironment, HostError,
    MicrophoneStream,
};
use crate::domain::device::{ConstraintProfile, InputDeviceOption};

use super::beat_player::NativeBeatPlayer;
use super::context::{NativeAudioContext, FALLBACK_SAMPLE_RATE};
use super::encoder::Container;
use super::microphone::{classify_backend_error, CpalMicrophone};

/// Host settings decided by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHostConfig {
    /// Whether the beat and API endpoints are reached over an encrypted
    /// transport (or loopback)
    pub secure_transport: bool,
    /// Play the monitor mix on the default output device
    pub monitor_output: bool,
}

impl Default for NativeHostConfig {
    fn default() -> Self {
        Self {
            secure_transport: true,
            monitor_output: true,
        }
    }
}

/// Audio host for the local machine
pub struct NativeAudioHost {
    config: NativeHostConfig,
    client: reqwest::Client,
}

impl NativeAudioHost {
    pub fn new(config: NativeHostConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Share an HTTP client with the API adapters
    pub fn with_client(config: NativeHostConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl AudioHost for NativeAudioHost {
    fn environment(&self) -> HostEnvironment {
        HostEnvironment {
            secure_transport: self.config.secure_transport,
            capture_supported: !cpal::available_hosts().is_empty(),
        }
    }

    async fn create_context(&self) -> Result<Box<dyn AudioContext>, HostError> {
        let context = if self.config.monitor_output {
            tokio::task::spawn_blocking(NativeAudioContext::with_output_device)
                .await
                .map_err(|e| HostError::Backend(format!("Context task failed: {}", e)))?
        } else {
            NativeAudioContext::headless(FALLBACK_SAMPLE_RATE)
        };
        Ok(Box::new(context))
    }

    fn create_beat_player(
        &self,
        url: &str,
        cross_origin: CrossOrigin,
    ) -> Result<Box<dyn BeatPlayer>, HostError> {
        Ok(Box::new(NativeBeatPlayer::new(
            url,
            cross_origin,
            self.client.clone(),
        )))
    }

    async fn request_permission(&self) -> Result<(), HostError> {
        tokio::task::spawn_blocking(|| -> Result<(), HostError> {
            let device = cpal::default_host()
                .default_input_device()
                .ok_or_else(|| HostError::NoDevice("no default input device".to_string()))?;
            device
                .default_input_config()
                .map(|_| ())
                .map_err(|e| classify_backend_error(&e.to_string()))
        })
        .await
        .map_err(|e| HostError::Backend(format!("Permission task failed: {}", e)))?
    }

    async fn enumerate_input_devices(&self) -> Result<Vec<InputDeviceOption>, HostError> {
        tokio::task::spawn_blocking(|| -> Result<Vec<InputDeviceOption>, HostError> {
            let devices = cpal::default_host()
                .input_devices()
                .map_err(|e| classify_backend_error(&e.to_string()))?;
            Ok(devices
                .filter_map(|device| device.name().ok())
                .map(|name| InputDeviceOption {
                    device_id: name.clone(),
                    label: name,
                })
                .collect())
        })
        .await
        .map_err(|e| HostError::Backend(format!("Enumeration task failed: {}", e)))?
    }

    async fn open_microphone(
        &self,
        profile: &ConstraintProfile,
    ) -> Result<Box<dyn MicrophoneStream>, HostError> {
        let microphone = CpalMicrophone::open(profile).await?;
        Ok(Box::new(microphone))
    }

    fn is_format_supported(&self, mime_type: &str) -> bool {
        Container::for_mime(mime_type).is_some()
    }
}
