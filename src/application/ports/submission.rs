//! Recording submission port interface

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::audio::{CaptureSummary, CapturedAudio};

/// Metadata the submission endpoint requires alongside the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionMetadata {
    pub beat_id: String,
    pub title: String,
    pub explicit: bool,
    pub performer_name: String,
    pub bearer_token: String,
}

/// JSON body of the create-recording request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordingRequest<'a> {
    pub beat_id: &'a str,
    pub title: &'a str,
    pub explicit: bool,
    pub performer_name: &'a str,
    pub mime_type: &'a str,
    pub size_bytes: usize,
    pub duration_seconds: u32,
}

impl<'a> CreateRecordingRequest<'a> {
    pub fn new(metadata: &'a SubmissionMetadata, summary: &'a CaptureSummary) -> Self {
        Self {
            beat_id: &metadata.beat_id,
            title: &metadata.title,
            explicit: metadata.explicit,
            performer_name: &metadata.performer_name,
            mime_type: &summary.mime_type,
            size_bytes: summary.size_bytes,
            duration_seconds: summary.duration_seconds,
        }
    }
}

/// Identifier and write destination for a created recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub id: String,
    pub upload_url: String,
}

/// Which handoff step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStep {
    Create,
    Upload,
}

impl fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create recording"),
            Self::Upload => write!(f, "upload audio"),
        }
    }
}

/// Why a handoff step failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionFailure {
    #[error("Not authorized. Sign in again to get a fresh token.")]
    Unauthorized,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

/// Submission error naming the failing step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to {step}: {failure}")]
pub struct SubmissionError {
    pub step: SubmissionStep,
    pub failure: SubmissionFailure,
}

impl SubmissionError {
    pub fn create(failure: SubmissionFailure) -> Self {
        Self {
            step: SubmissionStep::Create,
            failure,
        }
    }

    pub fn upload(failure: SubmissionFailure) -> Self {
        Self {
            step: SubmissionStep::Upload,
            failure,
        }
    }
}

/// Port for the external recordings API
#[async_trait]
pub trait RecordingApi: Send + Sync {
    /// Create a recording entity and receive its upload destination
    async fn create_recording(
        &self,
        metadata: &SubmissionMetadata,
        summary: &CaptureSummary,
    ) -> Result<UploadTicket, SubmissionFailure>;

    /// Transfer the payload to the upload destination
    async fn upload(
        &self,
        ticket: &UploadTicket,
        audio: &CapturedAudio,
        bearer_token: &str,
    ) -> Result<(), SubmissionFailure>;
}
