//! Recording session state machine

use std::fmt;
use thiserror::Error;

use super::RecordingLimits;
use crate::domain::audio::{CaptureSummary, CapturedAudio};

/// Session phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Preparing,
    Recording,
    Processing,
    Ready,
}

impl Phase {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// User asked to record
    StartRequested,
    /// Graph built and capture running
    SetupSucceeded,
    /// Graph could not be built or started
    SetupFailed(String),
    /// Manual stop or limit reached
    StopRequested,
    /// Chunks assembled into a payload
    FinalizeSucceeded(CapturedAudio),
    /// Chunks could not be assembled
    FinalizeFailed(String),
    /// Handoff failed; the take stays available
    SubmissionFailed(String),
    /// Discard, reselect, successful submission or shutdown
    Reset,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::StartRequested => "start recording",
            Self::SetupSucceeded => "complete setup",
            Self::SetupFailed(_) => "fail setup",
            Self::StopRequested => "stop recording",
            Self::FinalizeSucceeded(_) => "complete processing",
            Self::FinalizeFailed(_) => "fail processing",
            Self::SubmissionFailed(_) => "report submission failure",
            Self::Reset => "reset",
        }
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {action} while in {current_phase} phase")]
pub struct InvalidTransition {
    pub current_phase: Phase,
    pub action: &'static str,
}

/// Outcome of a timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not recording; nothing counted
    Ignored,
    Counted(u32),
    /// The counter hit the recording limit
    LimitReached(u32),
}

/// Recording session aggregate.
///
/// State machine:
///   IDLE -> PREPARING (StartRequested)
///   PREPARING -> RECORDING (SetupSucceeded)
///   PREPARING -> IDLE (SetupFailed)
///   RECORDING -> PROCESSING (StopRequested)
///   PROCESSING -> READY (FinalizeSucceeded)
///   PROCESSING -> IDLE (FinalizeFailed)
///   READY -> READY (SubmissionFailed)
///   any -> IDLE (Reset)
#[derive(Debug, Default)]
pub struct RecordingSession {
    phase: Phase,
    elapsed_seconds: u32,
    captured_audio: Option<CapturedAudio>,
    last_error: Option<String>,
    limits: RecordingLimits,
}

impl RecordingSession {
    /// Create a new idle session
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn captured_audio(&self) -> Option<&CapturedAudio> {
        self.captured_audio.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn limits(&self) -> RecordingLimits {
        self.limits
    }

    /// Apply an event. Illegal (phase, event) pairs leave the session untouched.
    pub fn apply(&mut self, event: SessionEvent) -> Result<Phase, InvalidTransition> {
        let next = match (self.phase, &event) {
            (Phase::Idle, SessionEvent::StartRequested) => Phase::Preparing,
            (Phase::Preparing, SessionEvent::SetupSucceeded) => Phase::Recording,
            (Phase::Preparing, SessionEvent::SetupFailed(_)) => Phase::Idle,
            (Phase::Recording, SessionEvent::StopRequested) => Phase::Processing,
            (Phase::Processing, SessionEvent::FinalizeSucceeded(_)) => Phase::Ready,
            (Phase::Processing, SessionEvent::FinalizeFailed(_)) => Phase::Idle,
            (Phase::Ready, SessionEvent::SubmissionFailed(_)) => Phase::Ready,
            (_, SessionEvent::Reset) => Phase::Idle,
            (current, event) => {
                return Err(InvalidTransition {
                    current_phase: current,
                    action: event.name(),
                })
            }
        };

        self.last_error = None;

        match event {
            SessionEvent::StartRequested => {
                self.elapsed_seconds = 0;
                self.captured_audio = None;
            }
            SessionEvent::SetupFailed(message)
            | SessionEvent::FinalizeFailed(message)
            | SessionEvent::SubmissionFailed(message) => {
                self.last_error = Some(message);
            }
            SessionEvent::FinalizeSucceeded(audio) => {
                self.captured_audio = Some(audio);
            }
            SessionEvent::Reset => {
                self.captured_audio = None;
            }
            SessionEvent::SetupSucceeded | SessionEvent::StopRequested => {}
        }

        if next != Phase::Ready {
            self.captured_audio = None;
        }

        self.phase = next;
        Ok(next)
    }

    /// Count one second of recording
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != Phase::Recording {
            return TickOutcome::Ignored;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        if self.limits.is_reached(self.elapsed_seconds) {
            TickOutcome::LimitReached(self.elapsed_seconds)
        } else {
            TickOutcome::Counted(self.elapsed_seconds)
        }
    }

    /// Immutable view for observers
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            elapsed_seconds: self.elapsed_seconds,
            max_duration_seconds: self.limits.max_duration_seconds(),
            capture: self.captured_audio.as_ref().map(CapturedAudio::summary),
            last_error: self.last_error.clone(),
        }
    }
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub elapsed_seconds: u32,
    pub max_duration_seconds: u32,
    pub capture: Option<CaptureSummary>,
    pub last_error: Option<String>,
}
