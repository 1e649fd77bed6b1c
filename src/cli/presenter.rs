//! CLI presenter for output formatting

use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::audio::{BeatDescriptor, CapturedAudio};
use crate::domain::device::InputDeviceOption;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Format recording progress bar
    pub fn format_progress(&self, elapsed_secs: u32, total_secs: u32) -> String {
        let percent = if total_secs > 0 {
            (f64::from(elapsed_secs) / f64::from(total_secs) * 100.0).min(100.0)
        } else {
            0.0
        };

        let bar_width = 20;
        let filled = ((percent / 100.0) * bar_width as f64) as usize;
        let empty = bar_width - filled;

        format!(
            "[{}{}] {:>3}s / {}s",
            "█".repeat(filled).cyan(),
            "░".repeat(empty),
            elapsed_secs,
            total_secs
        )
    }

    /// Update recording progress
    pub fn update_recording_progress(&self, elapsed_secs: u32, total_secs: u32) {
        let progress = self.format_progress(elapsed_secs, total_secs);
        self.update_spinner(&format!(
            "{} {}  {}",
            "● REC".red().bold(),
            progress,
            "Ctrl+C to stop".dimmed()
        ));
    }

    /// Print one catalog beat
    pub fn beat_row(&self, beat: &BeatDescriptor) {
        let mut details = Vec::new();
        if let Some(producer) = &beat.producer {
            details.push(format!("prod. {}", producer));
        }
        if let Some(bpm) = beat.bpm {
            details.push(format!("{} bpm", bpm));
        }
        let details = if details.is_empty() {
            String::new()
        } else {
            format!(" ({})", details.join(", ")).dimmed().to_string()
        };
        println!("{}  {}{}", beat.id.cyan(), beat.title, details);
    }

    /// Print one input device, marking the selected one
    pub fn device_row(&self, device: &InputDeviceOption, selected: bool) {
        let marker = if selected { "*".green() } else { " ".normal() };
        println!("{} {}", marker, device.label);
    }

    /// Summarize a finished take
    pub fn take_summary(&self, audio: &CapturedAudio) {
        self.success(&format!(
            "Take ready: {}s, {} ({})",
            audio.duration_seconds(),
            audio.human_readable_size(),
            audio.mime_type()
        ));
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
