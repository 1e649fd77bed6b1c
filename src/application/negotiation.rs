//! Device negotiation: form factor, input devices and constraint profile

use std::sync::Arc;

use crate::domain::device::{ClientHints, ConstraintProfile, FormFactor, InputDeviceOption};

use super::ports::{AudioHost, HostError};

/// Resolves the microphone constraint profile for each session
pub struct DeviceNegotiator<H: AudioHost> {
    host: Arc<H>,
    hints: ClientHints,
    form_factor: FormFactor,
    devices: Vec<InputDeviceOption>,
    selected_device: Option<String>,
    force_mono: bool,
    monitor_self: bool,
}

impl<H: AudioHost> DeviceNegotiator<H> {
    pub fn new(host: Arc<H>, hints: ClientHints) -> Self {
        let form_factor = FormFactor::classify(&hints);
        log::debug!("Classified client as {}", form_factor);
        Self {
            host,
            hints,
            form_factor,
            devices: Vec::new(),
            selected_device: None,
            force_mono: false,
            monitor_self: false,
        }
    }

    pub fn form_factor(&self) -> FormFactor {
        self.form_factor
    }

    pub fn hints(&self) -> &ClientHints {
        &self.hints
    }

    /// Devices from the last enumeration
    pub fn devices(&self) -> &[InputDeviceOption] {
        &self.devices
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    pub fn force_mono(&self) -> bool {
        self.force_mono
    }

    /// Re-classify after the viewport changed size
    pub fn on_viewport_resize(&mut self, width: u32) -> FormFactor {
        self.hints = self.hints.clone().with_viewport_width(width);
        let form_factor = FormFactor::classify(&self.hints);
        if form_factor != self.form_factor {
            log::info!("Form factor changed from {} to {}", self.form_factor, form_factor);
            self.form_factor = form_factor;
            if form_factor.is_mobile() {
                self.devices.clear();
            }
        }
        form_factor
    }

    /// Unlock labels and enumerate inputs. Mobile clients skip this entirely.
    pub async fn refresh_devices(&mut self) -> Result<&[InputDeviceOption], HostError> {
        if self.form_factor.is_mobile() {
            self.devices.clear();
            return Ok(&self.devices);
        }

        if let Err(e) = self.host.request_permission().await {
            // Enumeration still works, labels may be blank
            log::warn!("Audio permission request failed: {}", e);
        }

        self.devices = self.host.enumerate_input_devices().await?;
        log::debug!("Found {} input device(s)", self.devices.len());

        if let Some(selected) = &self.selected_device {
            if !self.devices.iter().any(|d| &d.device_id == selected) {
                log::warn!("Selected input device '{}' is no longer available", selected);
                self.selected_device = None;
            }
        }

        Ok(&self.devices)
    }

    /// Pin an input device. Ignored on mobile.
    pub fn select_device(&mut self, device_id: Option<String>) -> bool {
        if self.form_factor.is_mobile() {
            return false;
        }
        self.selected_device = device_id;
        true
    }

    /// Toggle mono folding. Ignored on mobile.
    pub fn set_force_mono(&mut self, force_mono: bool) -> bool {
        if self.form_factor.is_mobile() {
            return false;
        }
        self.force_mono = force_mono;
        true
    }

    pub fn set_monitor_self(&mut self, monitor_self: bool) {
        self.monitor_self = monitor_self;
    }

    /// Profile for the next session
    pub fn resolve_profile(&self) -> ConstraintProfile {
        let profile = match self.form_factor {
            FormFactor::Desktop => {
                ConstraintProfile::desktop(self.selected_device.clone(), self.force_mono)
            }
            FormFactor::Mobile => ConstraintProfile::mobile(),
        };
        profile.with_monitor_self(self.monitor_self)
    }
}
