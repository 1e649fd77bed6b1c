//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! and the session runner.

pub mod app;
pub mod args;
pub mod beats_cmd;
pub mod config_cmd;
pub mod devices_cmd;
pub mod presenter;
pub mod signals;

// Re-export commonly used types
pub use app::{run_session, RunError, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction, SessionOptions};
pub use presenter::Presenter;
