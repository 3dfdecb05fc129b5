//! Error types module
//!
//! Outcomes of an upload attempt fall into three classes:
//!
//! - **RejectedByPolicy** ([`RejectionReason`]): no file, bad format, oversize,
//!   unauthorized. Expected values, never retried, always shown to the user.
//! - **ProcessingFailure** ([`UploadError::Conversion`], [`UploadError::Compression`]):
//!   fatal to the attempt. Original bytes are never substituted for the failed derivative.
//! - **TransferFailure** ([`UploadError::Transfer`]): fatal to the attempt, no automatic
//!   retry.

use serde::Serialize;

/// Log level for outcome reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected outcomes like validation failures
    Debug,
    Warn,
    /// Unexpected failures
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RejectedByPolicy,
    ProcessingFailure,
    TransferFailure,
}

/// Describes how a non-success outcome should be presented and logged.
pub trait ErrorMetadata {
    /// Machine-readable code (e.g. "INVALID_FORMAT")
    fn error_code(&self) -> &'static str;

    /// Human-readable reason shown to the user
    fn client_message(&self) -> String;

    fn class(&self) -> ErrorClass;

    fn log_level(&self) -> LogLevel;
}

/// Why an attempt was refused before anything was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Invalid file format: {extension:?}")]
    InvalidFormat { extension: String },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Upload not authorized")]
    Unauthorized,
}

impl ErrorMetadata for RejectionReason {
    fn error_code(&self) -> &'static str {
        match self {
            RejectionReason::NoFileSelected => "NO_FILE_SELECTED",
            RejectionReason::InvalidFormat { .. } => "INVALID_FORMAT",
            RejectionReason::TooLarge { .. } => "TOO_LARGE",
            RejectionReason::Unauthorized => "UNAUTHORIZED",
        }
    }

    fn client_message(&self) -> String {
        match self {
            RejectionReason::NoFileSelected => "No image selected!".to_string(),
            RejectionReason::InvalidFormat { .. } => {
                "Only PNG, JPG, WEBP, HEIF and HEIC image files are allowed!".to_string()
            }
            RejectionReason::TooLarge { max, .. } => {
                format!("File is too large! The limit is {} MB.", max / (1024 * 1024))
            }
            RejectionReason::Unauthorized => "Not authorized to upload!".to_string(),
        }
    }

    fn class(&self) -> ErrorClass {
        ErrorClass::RejectedByPolicy
    }

    fn log_level(&self) -> LogLevel {
        match self {
            RejectionReason::Unauthorized => LogLevel::Warn,
            _ => LogLevel::Debug,
        }
    }
}

/// Stage that produced a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Conversion,
    Compression,
    Transfer,
}

/// Hard failure of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum UploadError {
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Transfer error: {0}")]
    Transfer(String),
}

impl UploadError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            FailureKind::Conversion => UploadError::Conversion(message),
            FailureKind::Compression => UploadError::Compression(message),
            FailureKind::Transfer => UploadError::Transfer(message),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            UploadError::Conversion(_) => FailureKind::Conversion,
            UploadError::Compression(_) => FailureKind::Compression,
            UploadError::Transfer(_) => FailureKind::Transfer,
        }
    }

    /// Internal detail carried by the error (may be surfaced to the user).
    pub fn detail(&self) -> &str {
        match self {
            UploadError::Conversion(m) | UploadError::Compression(m) | UploadError::Transfer(m) => m,
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::Conversion(_) => "CONVERSION_ERROR",
            UploadError::Compression(_) => "COMPRESSION_ERROR",
            UploadError::Transfer(_) => "TRANSFER_ERROR",
        }
    }

    fn client_message(&self) -> String {
        "Failed to upload image!".to_string()
    }

    fn class(&self) -> ErrorClass {
        match self {
            UploadError::Conversion(_) | UploadError::Compression(_) => {
                ErrorClass::ProcessingFailure
            }
            UploadError::Transfer(_) => ErrorClass::TransferFailure,
        }
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}
