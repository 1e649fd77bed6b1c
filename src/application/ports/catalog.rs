//! Beat catalog port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audio::BeatDescriptor;

/// Beat catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Beat not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

/// Port for listing and resolving beats
#[async_trait]
pub trait BeatCatalog: Send + Sync {
    async fn list_beats(&self) -> Result<Vec<BeatDescriptor>, CatalogError>;

    async fn get_beat(&self, id: &str) -> Result<BeatDescriptor, CatalogError>;
}
