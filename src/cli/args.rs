//! CLI argument definitions using Clap


use clap::{Parser, Subcommand};

/// Freestyle Booth - record a freestyle over a beat
#[derive(Parser, Debug)]
#[command(name = "freestyle-booth")]
#[command(version)]
#[command(about = "Record a freestyle over a beat and submit it")]
#[command(long_about = None)]
pub struct Cli {
    /// Beat identifier from the catalog
    #[arg(short = 'b', long, value_name = "ID", conflicts_with = "beat_url")]
    pub beat: Option<String>,

    /// Beat audio URL or local file, bypassing the catalog
    #[arg(long, value_name = "URL")]
    pub beat_url: Option<String>,

    /// Title of the recording
    #[arg(short = 't', long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Mark the recording as explicit
    #[arg(short = 'e', long)]
    pub explicit: bool,

    /// Beat volume in the mix (0-100)
    #[arg(long, value_name = "0-100", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,

    /// Input device name (see `freestyle-booth devices`)
    #[arg(short = 'i', long, value_name = "NAME")]
    pub device: Option<String>,

    /// Fold a stereo microphone to mono
    #[arg(long)]
    pub mono: bool,

    /// Hear your own microphone while recording
    #[arg(long)]
    pub monitor: bool,

    /// Record without submitting
    #[arg(long)]
    pub dry_run: bool,

    /// Recordings API base URL
    #[arg(long, value_name = "URL", env = "BOOTH_API_URL")]
    pub api_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List beats from the catalog
    Beats,
    /// List audio input devices
    Devices,
}

/// Config action subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Options for one recording session, after config merging
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub beat_id: Option<String>,
    pub beat_url: Option<String>,
    pub title: Option<String>,
    pub explicit: bool,
    pub dry_run: bool,
}

impl Cli {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            beat_id: self.beat.clone(),
            beat_url: self.beat_url.clone(),
            title: self.title.clone(),
            explicit: self.explicit,
            dry_run: self.dry_run,
        }
    }

    /// Log filter for `env_logger`, unless `RUST_LOG` is set
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api_url",
    "token",
    "performer",
    "beat_volume",
    "force_mono",
    "monitor_microphone",
    "input_device",
    "formats",
    "beat_load_timeout",
    "client.viewport_width",
    "client.user_agent",
    "client.touch_points",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
