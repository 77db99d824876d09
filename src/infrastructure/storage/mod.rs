use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod ipfs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Content store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid content store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Content store did not return a hash")]
    MissingHash,
}

/// Content-addressed storage. `add` reports bytes transferred so far on `progress`
/// and resolves to the content hash of the file.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn add(&self, path: &Path, progress: mpsc::Sender<u64>) -> Result<String, StoreError>;
}
