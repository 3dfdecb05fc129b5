//! In-memory storage, used by tests and dry runs.
//!
//! Records every write attempt and can be told to fail writes or reference
//! resolution, so callers can observe how the uploader behaves on store faults.

use crate::keys::{object_url, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

const MEMORY_BASE_URL: &str = "memory://imgdrop";

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    write_attempts: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_resolve: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a write attempt.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.lock().insert(key.to_string(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of `upload_with_key` calls, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panicked test thread must not poison every later assertion.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        validate_key(storage_key)?;

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!(
                "injected write failure for {}",
                storage_key
            )));
        }

        let size = data.len();
        self.lock().insert(storage_key.to_string(), data);
        tracing::debug!(key = %storage_key, size_bytes = size, "Memory storage upload");
        Ok(())
    }

    async fn resolve_url(&self, storage_key: &str) -> StorageResult<String> {
        validate_key(storage_key)?;

        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError(format!(
                "injected resolve failure for {}",
                storage_key
            )));
        }
        if !self.lock().contains_key(storage_key) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }
        Ok(object_url(MEMORY_BASE_URL, storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        validate_key(storage_key)?;
        self.get(storage_key)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn count_objects(&self, prefix: &str) -> StorageResult<u64> {
        Ok(self.lock().keys().filter(|k| k.starts_with(prefix)).count() as u64)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
