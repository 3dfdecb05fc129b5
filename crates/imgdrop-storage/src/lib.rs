//! imgdrop Storage Library
//!
//! This crate provides the remote store abstraction the uploader writes to, with
//! implementations for S3-compatible object stores, the local filesystem and memory.
//!
//! # Storage key format
//!
//! Keys are relative object paths such as `images/image3V1StGXR8.png`. Keys must not
//! contain `..` or a leading `/`; every backend checks this through the `keys` module.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use imgdrop_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
