//! Microphone constraint profile and input device options

use serde::{Deserialize, Serialize};

use super::FormFactor;

/// An input device the user can pick. Read-only enumeration result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDeviceOption {
    pub device_id: String,
    pub label: String,
}

/// Constraints applied when acquiring the microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintProfile {
    /// Pinned input device, `None` for the host default
    pub device_id: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Fold a two-channel microphone down to one channel
    pub force_mono: bool,
    /// Route the microphone to the local monitor output
    pub monitor_self: bool,
}

impl ConstraintProfile {
    /// Desktop: raw studio-style capture, optional device pin and mono fold
    pub fn desktop(device_id: Option<String>, force_mono: bool) -> Self {
        Self {
            device_id,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            force_mono,
            monitor_self: false,
        }
    }

    /// Mobile: platform voice processing on, host default device
    pub fn mobile() -> Self {
        Self {
            device_id: None,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            force_mono: false,
            monitor_self: false,
        }
    }

    /// Default profile for a form factor
    pub fn for_form_factor(form_factor: FormFactor) -> Self {
        match form_factor {
            FormFactor::Desktop => Self::desktop(None, false),
            FormFactor::Mobile => Self::mobile(),
        }
    }

    pub fn with_monitor_self(mut self, monitor_self: bool) -> Self {
        self.monitor_self = monitor_self;
        self
    }

    /// Whether any voice processing is requested
    pub fn wants_processing(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

impl Default for ConstraintProfile {
    fn default() -> Self {
        Self::for_form_factor(FormFactor::Desktop)
    }
}
