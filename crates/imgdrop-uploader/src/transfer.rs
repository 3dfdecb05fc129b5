use std::sync::Arc;
use std::time::Instant;

use imgdrop_core::{content_type_for_extension, RemoteReference, StorageKey, UploadError};
use imgdrop_storage::Storage;

/// Writes a blob and resolves a fetchable reference to it, as one logical step.
#[derive(Clone)]
pub struct TransferClient {
    storage: Arc<dyn Storage>,
}

impl TransferClient {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Write `bytes` under `key`, then resolve its reference.
    ///
    /// A failed resolution after a successful write is still a `Transfer` failure.
    /// The written object is left in place (no rollback).
    pub async fn upload(&self, bytes: Vec<u8>, key: &StorageKey) -> Result<RemoteReference, UploadError> {
        let path = key.as_path();
        let size = bytes.len();
        let start = Instant::now();

        self.storage
            .upload_with_key(&path, bytes, content_type_for_extension(&key.extension))
            .await
            .map_err(|e| UploadError::Transfer(e.to_string()))?;

        let url = self.storage.resolve_url(&path).await.map_err(|e| {
            tracing::warn!(
                key = %path,
                error = %e,
                "Object written but reference resolution failed; object left orphaned"
            );
            UploadError::Transfer(e.to_string())
        })?;

        tracing::info!(
            key = %path,
            size_bytes = size,
            backend = %self.storage.backend_type(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transfer complete"
        );

        Ok(RemoteReference { key: path, url })
    }
}
