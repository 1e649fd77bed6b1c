//! Recording session domain module

mod diagnostic;
mod limits;
#[allow(clippy::module_inception)]
mod session;

pub use diagnostic::{FailureKind, ProcessingError, SetupError, StartError};
pub use limits::{RecordingLimits, MAX_DURATION_SECONDS};
pub use session::{
    InvalidTransition, Phase, RecordingSession, SessionEvent, SessionSnapshot, TickOutcome,
};
