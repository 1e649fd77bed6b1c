//! XDG config store adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Directory name under the XDG config home
const APP_DIR: &str = "freestyle-booth";

/// XDG-compliant config store
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    /// Store at `$XDG_CONFIG_HOME/freestyle-booth/config.toml`
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR);

        Self {
            path: config_dir.join("config.toml"),
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.exists() {
            return Ok(AppConfig::empty());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let content = Self::to_toml(config)?;

        fs::write(&self.path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        log::debug!("Config written to {}", self.path.display());
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path.to_string_lossy().to_string(),
            ));
        }

        self.save(&AppConfig::defaults()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ClientConfig;

    #[test]
    fn default_path_is_xdg() {
        let store = XdgConfigStore::new();
        let path = store.path();
        assert!(path.to_string_lossy().contains("freestyle-booth"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn parse_flat_format_with_client_table() {
        let content = r#"
api_url = "https://booth.example/api"
token = "abc"
beat_volume = 55
force_mono = true
formats = ["audio/wav"]

[client]
viewport_width = 390
"#;

        let config = XdgConfigStore::parse_toml(content).unwrap();
        assert_eq!(config.api_url.as_deref(), Some("https://booth.example/api"));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.beat_volume, Some(55));
        assert_eq!(config.force_mono, Some(true));
        assert_eq!(config.formats, Some(vec!["audio/wav".to_string()]));
        assert_eq!(config.client.and_then(|c| c.viewport_width), Some(390));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(
            XdgConfigStore::parse_toml("beat_volume = \"loud\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let config = store.load().await.unwrap();
        assert!(config.api_url.is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("nested").join("config.toml"));
        let config = AppConfig {
            performer: Some("MC Test".to_string()),
            monitor_microphone: Some(true),
            client: Some(ClientConfig {
                user_agent: Some("Mozilla/5.0 (iPhone)".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        store.save(&config).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.performer.as_deref(), Some("MC Test"));
        assert_eq!(loaded.monitor_microphone, Some(true));
        assert!(loaded.client_hints().user_agent_is_mobile());
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        store.init().await.unwrap();
        assert!(matches!(
            store.init().await,
            Err(ConfigError::AlreadyExists(_))
        ));
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.beat_volume, Some(70));
    }
}
