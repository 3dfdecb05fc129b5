use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::time::Duration;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    presign_ttl: Option<Duration>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `presign_ttl` - When set, resolved references are presigned GET URLs valid for
    ///   this long instead of plain object URLs
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        presign_ttl: Option<Duration>,
    ) -> StorageResult<Self> {
        // Credentials come from the environment (AWS_ACCESS_KEY_ID etc.).
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
            presign_ttl,
        })
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style URLs under the endpoint
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        validate_key(storage_key)?;
        let size = data.len() as u64;
        let bytes = Bytes::from(data);
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(bytes)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn resolve_url(&self, storage_key: &str) -> StorageResult<String> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        match self.store.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => return Err(StorageError::BackendError(e.to_string())),
        }

        match self.presign_ttl {
            Some(ttl) => {
                let url_result: ObjectResult<_> =
                    self.store.signed_url(Method::GET, &location, ttl).await;
                let url = url_result
                    .map_err(|e| StorageError::BackendError(e.to_string()))?
                    .to_string();
                Ok(url)
            }
            None => Ok(self.generate_url(storage_key)),
        }
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        validate_key(storage_key)?;
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn count_objects(&self, prefix: &str) -> StorageResult<u64> {
        // object_store lists by path segments; filter the remainder of the prefix locally.
        let (dir_part, _) = prefix.rsplit_once('/').unwrap_or(("", ""));
        let dir = (!dir_part.is_empty()).then(|| Path::from(dir_part.to_string()));

        let count = self
            .store
            .list(dir.as_ref())
            .try_fold(0u64, |acc, meta| {
                let matches = meta.location.as_ref().starts_with(prefix);
                futures::future::ready(Ok(acc + u64::from(matches)))
            })
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        tracing::debug!(bucket = %self.bucket, prefix = %prefix, count, "S3 object count");
        Ok(count)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
