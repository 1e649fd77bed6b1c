//! HTTP adapters for the recordings API and beat catalog

mod http_catalog;
mod http_submission;

pub use http_catalog::HttpBeatCatalog;
pub use http_submission::HttpRecordingApi;
