use crate::keys::{object_url, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/imgdrop")
    /// * `base_url` - Base URL the directory is served under (e.g., "http://localhost:8080")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Keys resolving outside the base directory (through symlinks) are rejected.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        if let Ok(canonical) = path.canonicalize() {
            let base_canonical = self.base_path.canonicalize().map_err(|e| {
                StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
            })?;
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Relative key of a file below the base directory, with `/` separators.
    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn resolve_url(&self, storage_key: &str) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }
        Ok(object_url(&self.base_url, storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn count_objects(&self, prefix: &str) -> StorageResult<u64> {
        if prefix.contains("..") || prefix.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Prefix contains invalid characters".to_string(),
            ));
        }

        // Walk from the deepest directory fully named by the prefix.
        let dir_part = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let root = self.base_path.join(dir_part);
        if !fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(0);
        }

        let mut count = 0u64;
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = self.relative_key(&path) {
                        if key.starts_with(prefix) {
                            count += 1;
                        }
                    }
                }
            }
        }

        tracing::debug!(prefix = %prefix, count, "Local storage count");
        Ok(count)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:8080".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = b"test data".to_vec();
        storage
            .upload_with_key("images/image0abcdefgh.png", data.clone(), "image/png")
            .await
            .unwrap();

        let downloaded = storage.download("images/image0abcdefgh.png").await.unwrap();
        assert_eq!(data, downloaded);
    }

    #[tokio::test]
    async fn test_resolve_url_requires_object() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let missing = storage.resolve_url("images/missing.png").await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));

        storage
            .upload_with_key("images/present.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        let url = storage.resolve_url("images/present.png").await.unwrap();
        assert_eq!(url, "http://localhost:8080/images/present.png");
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .upload_with_key("../escape.png", vec![0], "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.resolve_url("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("config/upload_token").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_count_objects_by_prefix() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert_eq!(storage.count_objects("images/").await.unwrap(), 0);

        for key in [
            "images/image0aaaaaaaa.png",
            "images/image1bbbbbbbb.jpg",
            "images/nested/image2cccccccc.webp",
            "config/upload_token",
        ] {
            storage.upload_with_key(key, vec![1], "").await.unwrap();
        }

        assert_eq!(storage.count_objects("images/").await.unwrap(), 3);
        assert_eq!(storage.count_objects("images/image1").await.unwrap(), 1);
        assert_eq!(storage.count_objects("config/").await.unwrap(), 1);
        assert_eq!(storage.count_objects("").await.unwrap(), 4);
    }
}
