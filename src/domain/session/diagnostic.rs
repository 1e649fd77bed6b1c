//! Capture failure taxonomy and user-facing diagnostics

use thiserror::Error;

use crate::domain::device::FormFactor;

/// Failure while building the audio graph.
///
/// `Display` is the technical description for logs; `user_message` is what
/// ends up on the session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("insecure context: capture requires an encrypted transport")]
    InsecureContext,

    #[error("live audio capture is not supported by this host")]
    CaptureUnsupported,

    #[error("no supported recording format (tried: {})", tried.join(", "))]
    NoSupportedFormat { tried: Vec<String> },

    #[error("beat failed to load (code {code:?}): {message}")]
    BeatLoad { code: Option<u16>, message: String },

    #[error("microphone stream contains no audio tracks")]
    NoAudioTracks,

    #[error("no audio input device available")]
    NoInputDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("no beat selected")]
    NoBeatSelected,
}

impl SetupError {
    /// Failure category
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PermissionDenied => FailureKind::Permission,
            Self::InsecureContext | Self::CaptureUnsupported | Self::NoSupportedFormat { .. } => {
                FailureKind::Environment
            }
            Self::BeatLoad { .. } | Self::NoBeatSelected => FailureKind::Media,
            Self::NoAudioTracks | Self::NoInputDevice | Self::Device(_) => FailureKind::Device,
        }
    }

    /// Human-readable message for the session state
    pub fn user_message(&self, form_factor: FormFactor) -> String {
        match self {
            Self::PermissionDenied => match form_factor {
                FormFactor::Mobile => "Microphone access was denied. Open your device settings, \
                     allow microphone access for this app, then reload and try again."
                    .to_string(),
                FormFactor::Desktop => "Microphone access was denied. Allow microphone access in \
                     your system privacy settings, then reload and try again."
                    .to_string(),
            },
            Self::InsecureContext => {
                "Recording requires a secure (HTTPS) connection. Switch to a secure connection \
                 and try again."
                    .to_string()
            }
            Self::CaptureUnsupported => {
                "Live audio capture is not supported here. Use a recent browser or a device \
                 with microphone support."
                    .to_string()
            }
            Self::NoSupportedFormat { .. } => {
                "No supported recording format is available. Try a different browser or device."
                    .to_string()
            }
            Self::BeatLoad { code, .. } => match code {
                Some(code) => format!(
                    "The beat could not be loaded (media error {}). Try again or pick another beat.",
                    code
                ),
                None => "The beat could not be loaded. Try again or pick another beat.".to_string(),
            },
            Self::NoAudioTracks | Self::NoInputDevice | Self::Device(_) => {
                "No microphone audio could be captured. Check that your microphone is connected \
                 and not in use by another application."
                    .to_string()
            }
            Self::NoBeatSelected => "Select a beat before recording.".to_string(),
        }
    }
}

/// Failure while starting capture on a built graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("audio engine is not set up")]
    NotReady,

    #[error("failed to start capture: {0}")]
    Capture(String),

    #[error("failed to start beat playback: {0}")]
    Playback(String),
}

impl StartError {
    pub fn user_message(&self) -> String {
        "Recording could not be started. Please try again.".to_string()
    }
}

/// Failure while assembling the captured chunks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("capture finalization failed: {0}")]
    Finalize(String),

    #[error("captured payload is empty")]
    EmptyPayload,
}

impl ProcessingError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::Processing
    }

    pub fn user_message(&self) -> String {
        "Something went wrong while processing your recording. Please try again.".to_string()
    }
}

/// Coarse failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Permission,
    Environment,
    Media,
    Device,
    Processing,
    Submission,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_message_mentions_denied() {
        for ff in [FormFactor::Desktop, FormFactor::Mobile] {
            let msg = SetupError::PermissionDenied.user_message(ff);
            assert!(msg.contains("denied"));
            assert!(msg.contains("reload"));
        }
    }

    #[test]
    fn permission_message_is_platform_specific() {
        let desktop = SetupError::PermissionDenied.user_message(FormFactor::Desktop);
        let mobile = SetupError::PermissionDenied.user_message(FormFactor::Mobile);
        assert_ne!(desktop, mobile);
        assert!(mobile.contains("device settings"));
    }

    #[test]
    fn beat_load_message_includes_code() {
        let err = SetupError::BeatLoad {
            code: Some(4),
            message: "unsupported".into(),
        };
        assert!(err.user_message(FormFactor::Desktop).contains("media error 4"));
    }

    #[test]
    fn environment_messages_name_requirement() {
        assert!(SetupError::InsecureContext
            .user_message(FormFactor::Desktop)
            .contains("HTTPS"));
        let tried = SetupError::NoSupportedFormat {
            tried: vec!["audio/webm".into()],
        };
        assert!(tried.to_string().contains("audio/webm"));
        assert_eq!(tried.kind(), FailureKind::Environment);
    }

    #[test]
    fn device_errors_share_generic_message() {
        let a = SetupError::NoAudioTracks.user_message(FormFactor::Desktop);
        let b = SetupError::NoInputDevice.user_message(FormFactor::Desktop);
        assert_eq!(a, b);
        assert_eq!(SetupError::NoAudioTracks.kind(), FailureKind::Device);
    }
}
