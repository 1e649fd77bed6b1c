//! Recording limits

/// Hard cap on a single take, in seconds
pub const MAX_DURATION_SECONDS: u32 = 30;

/// Immutable recording limits. Not configurable in this version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingLimits {
    max_duration_seconds: u32,
}

impl RecordingLimits {
    pub const fn new() -> Self {
        Self {
            max_duration_seconds: MAX_DURATION_SECONDS,
        }
    }

    pub const fn max_duration_seconds(&self) -> u32 {
        self.max_duration_seconds
    }

    /// Whether a take of `elapsed_seconds` has hit the cap
    pub const fn is_reached(&self, elapsed_seconds: u32) -> bool {
        elapsed_seconds >= self.max_duration_seconds
    }
}

impl Default for RecordingLimits {
    fn default() -> Self {
        Self::new()
    }
}
