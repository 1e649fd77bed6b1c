//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::audio::RecordingFormat;
use crate::domain::config::{AppConfig, ClientConfig};
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

fn unknown_key(key: &str) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    if !is_valid_config_key(key) {
        return Err(unknown_key(key));
    }

    let mut config = store.load().await?;
    apply_config_value(&mut config, key, value)?;
    store.save(&config).await?;

    let shown = if key == "token" {
        mask_token(value)
    } else {
        value.to_string()
    };
    presenter.success(&format!("{} = {}", key, shown));
    Ok(())
}

/// Validate `value` and store it under `key`
fn apply_config_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "api_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid(key, "Value must be an http(s) URL"));
            }
            config.api_url = Some(value.trim_end_matches('/').to_string());
        }
        "token" => config.token = Some(value.to_string()),
        "performer" => config.performer = Some(value.to_string()),
        "beat_volume" => {
            let volume: u8 = value
                .parse()
                .ok()
                .filter(|v| *v <= 100)
                .ok_or_else(|| invalid(key, "Value must be a number from 0 to 100"))?;
            config.beat_volume = Some(volume);
        }
        "force_mono" => config.force_mono = Some(parse_bool_for(key, value)?),
        "monitor_microphone" => config.monitor_microphone = Some(parse_bool_for(key, value)?),
        "input_device" => config.input_device = Some(value.to_string()),
        "formats" => {
            let formats: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if formats.is_empty() {
                return Err(invalid(key, "Provide at least one MIME type"));
            }
            for format in &formats {
                format
                    .parse::<RecordingFormat>()
                    .map_err(|e| invalid(key, e.to_string()))?;
            }
            config.formats = Some(formats);
        }
        "beat_load_timeout" => {
            let secs: u64 = value
                .parse()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| invalid(key, "Value must be a positive number of seconds"))?;
            config.beat_load_timeout = Some(secs);
        }
        "client.viewport_width" => {
            let width: u32 = value
                .parse()
                .map_err(|_| invalid(key, "Value must be a width in pixels"))?;
            client_mut(config).viewport_width = Some(width);
        }
        "client.user_agent" => client_mut(config).user_agent = Some(value.to_string()),
        "client.touch_points" => {
            let points: u32 = value
                .parse()
                .map_err(|_| invalid(key, "Value must be a whole number"))?;
            client_mut(config).touch_points = Some(points);
        }
        _ => return Err(unknown_key(key)),
    }
    Ok(())
}

fn client_mut(config: &mut AppConfig) -> &mut ClientConfig {
    config.client.get_or_insert_with(ClientConfig::default)
}

/// Display value of `key`, `None` when unset
fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    let client = config.client.as_ref();
    match key {
        "api_url" => config.api_url.clone(),
        "token" => config.token.as_deref().map(mask_token),
        "performer" => config.performer.clone(),
        "beat_volume" => config.beat_volume.map(|v| v.to_string()),
        "force_mono" => config.force_mono.map(|b| b.to_string()),
        "monitor_microphone" => config.monitor_microphone.map(|b| b.to_string()),
        "input_device" => config.input_device.clone(),
        "formats" => config.formats.as_ref().map(|f| f.join(", ")),
        "beat_load_timeout" => config.beat_load_timeout.map(|s| format!("{}s", s)),
        "client.viewport_width" => client.and_then(|c| c.viewport_width).map(|w| w.to_string()),
        "client.user_agent" => client.and_then(|c| c.user_agent.clone()),
        "client.touch_points" => client.and_then(|c| c.touch_points).map(|t| t.to_string()),
        _ => None,
    }
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    if !is_valid_config_key(key) {
        return Err(unknown_key(key));
    }

    let config = store.load().await?;
    presenter.output(config_value(&config, key).as_deref().unwrap_or(NOT_SET));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        presenter.key_value(key, config_value(&config, key).as_deref().unwrap_or(NOT_SET));
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn parse_bool_for(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|_| invalid(key, "Value must be 'true' or 'false'"))
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

/// Mask a token for display (show first 4 and last 4 chars)
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("no"), Ok(false));
        assert_eq!(parse_bool("1"), Ok(true));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn mask_long_token() {
        assert_eq!(mask_token("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_short_token() {
        assert_eq!(mask_token("short"), "*****");
    }

    #[test]
    fn beat_volume_is_range_checked() {
        let mut config = AppConfig::empty();
        assert!(apply_config_value(&mut config, "beat_volume", "55").is_ok());
        assert_eq!(config.beat_volume, Some(55));
        assert!(apply_config_value(&mut config, "beat_volume", "101").is_err());
        assert!(apply_config_value(&mut config, "beat_volume", "loud").is_err());
    }

    #[test]
    fn formats_are_parsed_as_mime_types() {
        let mut config = AppConfig::empty();
        apply_config_value(&mut config, "formats", "audio/wav, audio/flac").unwrap();
        assert_eq!(
            config.formats,
            Some(vec!["audio/wav".to_string(), "audio/flac".to_string()])
        );
        assert!(apply_config_value(&mut config, "formats", " , ").is_err());
        assert!(apply_config_value(&mut config, "formats", "not a mime").is_err());
    }

    #[test]
    fn client_keys_create_the_table() {
        let mut config = AppConfig::empty();
        apply_config_value(&mut config, "client.viewport_width", "390").unwrap();
        assert_eq!(config_value(&config, "client.viewport_width").as_deref(), Some("390"));
        assert!(config_value(&config, "client.user_agent").is_none());
    }

    #[test]
    fn api_url_must_be_http() {
        let mut config = AppConfig::empty();
        assert!(apply_config_value(&mut config, "api_url", "ftp://x").is_err());
        apply_config_value(&mut config, "api_url", "https://booth.example/api/").unwrap();
        assert_eq!(config.api_url.as_deref(), Some("https://booth.example/api"));
    }

    #[test]
    fn token_is_masked_on_read() {
        let config = AppConfig {
            token: Some("tok_1234567890".to_string()),
            ..Default::default()
        };
        assert_eq!(config_value(&config, "token").as_deref(), Some("tok_...7890"));
    }
}
