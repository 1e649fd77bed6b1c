//! Input device listing

use crate::application::ports::{AudioHost, HostError};
use crate::application::DeviceNegotiator;
use crate::domain::config::AppConfig;

use super::presenter::Presenter;

/// Print the input devices the host reports, marking the configured one
pub async fn handle_devices_command<H: AudioHost>(
    negotiator: &mut DeviceNegotiator<H>,
    config: &AppConfig,
    presenter: &Presenter,
) -> Result<(), HostError> {
    if negotiator.form_factor().is_mobile() {
        presenter.info("Mobile clients always record from the default input");
        return Ok(());
    }

    let devices = negotiator.refresh_devices().await?;
    if devices.is_empty() {
        presenter.warn("No audio input devices found");
        return Ok(());
    }
    for device in devices {
        let selected = config.input_device.as_deref() == Some(device.device_id.as_str());
        presenter.device_row(device, selected);
    }
    Ok(())
}
