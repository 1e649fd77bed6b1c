//! Submission bridge: hands a finished capture to the recordings API

use crate::domain::audio::CapturedAudio;

use super::ports::{
    RecordingApi, SubmissionError, SubmissionFailure, SubmissionMetadata, UploadTicket,
};

/// Two-step create-then-upload handoff
pub struct SubmissionBridge<A: RecordingApi> {
    api: A,
}

impl<A: RecordingApi> SubmissionBridge<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Create the recording entity, then upload the payload to it.
    /// Succeeds only when both steps succeed.
    pub async fn submit(
        &self,
        audio: &CapturedAudio,
        metadata: &SubmissionMetadata,
    ) -> Result<UploadTicket, SubmissionError> {
        if metadata.bearer_token.trim().is_empty() {
            return Err(SubmissionError::create(SubmissionFailure::Unauthorized));
        }

        let summary = audio.summary();
        let ticket = self
            .api
            .create_recording(metadata, &summary)
            .await
            .map_err(SubmissionError::create)?;
        log::debug!("Created recording {}", ticket.id);

        self.api
            .upload(&ticket, audio, &metadata.bearer_token)
            .await
            .map_err(SubmissionError::upload)?;
        log::info!(
            "Uploaded {} for recording {}",
            audio.human_readable_size(),
            ticket.id
        );

        Ok(ticket)
    }
}
