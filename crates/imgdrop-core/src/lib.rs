//! imgdrop Core Library
//!
//! This crate provides the data model, error taxonomy and configuration shared by
//! the storage, processing and uploader crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{OutputFormat, ReduceConfig, ReducePolicy, StorageConfig, UploaderConfig};
pub use error::{ErrorClass, ErrorMetadata, FailureKind, LogLevel, RejectionReason, UploadError};
pub use models::{
    content_type_for_extension, extension_of, RemoteReference, StorageKey, UploadCandidate,
    UploadOutcome,
};
pub use storage_types::StorageBackend;
