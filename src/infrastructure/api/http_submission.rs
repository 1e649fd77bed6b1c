//! Recordings API adapter

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::application::ports::{
    CreateRecordingRequest, RecordingApi, SubmissionFailure, SubmissionMetadata, UploadTicket,
};
use crate::domain::audio::{CaptureSummary, CapturedAudio};

// Response types for the recordings API

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecordingResponse {
    id: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// HTTP client for `POST {api}/recordings` and the follow-up upload
pub struct HttpRecordingApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRecordingApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn recordings_url(&self) -> String {
        format!("{}/recordings", self.base_url)
    }

    /// Absolute upload URL. Relative destinations resolve against the API base.
    fn resolve_upload_url(&self, upload_url: &str) -> Result<Url, SubmissionFailure> {
        if let Ok(url) = Url::parse(upload_url) {
            return Ok(url);
        }
        let base = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| SubmissionFailure::RequestFailed(format!("Invalid API URL: {}", e)))?;
        base.join(upload_url.trim_start_matches('/'))
            .map_err(|e| SubmissionFailure::ParseError(format!("Invalid upload URL: {}", e)))
    }

    /// Own-origin destinations get the bearer token; pre-signed ones do not
    fn is_own_origin(&self, url: &Url) -> bool {
        Url::parse(&self.base_url)
            .map(|base| base.origin() == url.origin())
            .unwrap_or(false)
    }

    async fn failure_from(response: reqwest::Response) -> SubmissionFailure {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return SubmissionFailure::Unauthorized;
        }
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        SubmissionFailure::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl RecordingApi for HttpRecordingApi {
    async fn create_recording(
        &self,
        metadata: &SubmissionMetadata,
        summary: &CaptureSummary,
    ) -> Result<UploadTicket, SubmissionFailure> {
        let body = CreateRecordingRequest::new(metadata, summary);

        let response = self
            .client
            .post(self.recordings_url())
            .bearer_auth(&metadata.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmissionFailure::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure_from(response).await);
        }

        let created: CreateRecordingResponse = response
            .json()
            .await
            .map_err(|e| SubmissionFailure::ParseError(e.to_string()))?;

        Ok(UploadTicket {
            id: created.id,
            upload_url: created.upload_url,
        })
    }

    async fn upload(
        &self,
        ticket: &UploadTicket,
        audio: &CapturedAudio,
        bearer_token: &str,
    ) -> Result<(), SubmissionFailure> {
        let url = self.resolve_upload_url(&ticket.upload_url)?;
        let own_origin = self.is_own_origin(&url);

        let mut request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, audio.mime_type())
            .body(audio.payload().to_vec());
        if own_origin {
            request = request.bearer_auth(bearer_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SubmissionFailure::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure_from(response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recordings_url_trims_trailing_slash() {
        let api = HttpRecordingApi::new("https://booth.example/api/");
        assert_eq!(api.recordings_url(), "https://booth.example/api/recordings");
    }

    #[test]
    fn absolute_upload_url_is_kept() {
        let api = HttpRecordingApi::new("https://booth.example/api");
        let url = api
            .resolve_upload_url("https://storage.example/put/abc?sig=1")
            .unwrap();
        assert_eq!(url.as_str(), "https://storage.example/put/abc?sig=1");
        assert!(!api.is_own_origin(&url));
    }

    #[test]
    fn relative_upload_url_resolves_against_api() {
        let api = HttpRecordingApi::new("https://booth.example/api");
        let url = api.resolve_upload_url("/recordings/abc/audio").unwrap();
        assert_eq!(url.as_str(), "https://booth.example/api/recordings/abc/audio");
        assert!(api.is_own_origin(&url));
    }
}
