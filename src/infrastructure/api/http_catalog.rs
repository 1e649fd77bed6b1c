//! Beat catalog adapter

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::application::ports::{BeatCatalog, CatalogError};
use crate::domain::audio::BeatDescriptor;

/// `GET /beats` may answer with a bare list or a wrapped one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BeatListResponse {
    Wrapped { beats: Vec<BeatDescriptor> },
    Bare(Vec<BeatDescriptor>),
}

/// HTTP client for `GET {api}/beats` and `GET {api}/beats/{id}`
pub struct HttpBeatCatalog {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpBeatCatalog {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, CatalogError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))
    }
}

#[async_trait]
impl BeatCatalog for HttpBeatCatalog {
    async fn list_beats(&self) -> Result<Vec<BeatDescriptor>, CatalogError> {
        let response = self.get("/beats").await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::RequestFailed(format!("HTTP {}", status)));
        }

        let list: BeatListResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(match list {
            BeatListResponse::Wrapped { beats } => beats,
            BeatListResponse::Bare(beats) => beats,
        })
    }

    async fn get_beat(&self, id: &str) -> Result<BeatDescriptor, CatalogError> {
        let response = self.get(&format!("/beats/{}", id)).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(CatalogError::RequestFailed(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))
    }
}
