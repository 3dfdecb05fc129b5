//! Storage abstraction trait
//!
//! This module defines the remote store contract the uploader depends on.

use crate::StorageBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Remote blob namespace.
///
/// All backends (S3, local filesystem, memory) implement this trait so the uploader
/// never depends on a concrete store. Writing and resolving are separate calls; the
/// transfer client composes them into one logical step.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key`, replacing any existing object.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Resolve a fetchable URL for an existing object.
    ///
    /// Fails with [`StorageError::NotFound`] when nothing is stored under the key.
    async fn resolve_url(&self, storage_key: &str) -> StorageResult<String>;

    /// Read a whole object (used for small well-known objects).
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Number of objects whose key starts with `prefix`.
    async fn count_objects(&self, prefix: &str) -> StorageResult<u64>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
