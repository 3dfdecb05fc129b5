//! Shared key checks and URL building for storage backends.

use crate::traits::{StorageError, StorageResult};

/// Reject keys that could escape the namespace (`..`, leading `/`) or are empty.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// `{base}/{key}` with each key segment percent-encoded.
pub fn object_url(base_url: &str, storage_key: &str) -> String {
    let encoded: Vec<String> = storage_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}
