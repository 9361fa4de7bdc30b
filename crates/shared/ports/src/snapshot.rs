use async_trait::async_trait;
use geotrackr_core::AssetSnapshot;
use thiserror::Error;

/// Failure while fetching the authoritative snapshot
///
/// Collaborator implementations convert their own errors to this type so
/// the sync core never sees their transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Port for the externally polled asset list
///
/// The core only ever asks it to refetch and merges what comes back.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_assets(&self) -> Result<Vec<AssetSnapshot>, FetchError>;
}
