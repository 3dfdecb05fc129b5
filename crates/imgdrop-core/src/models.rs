//! Pipeline data model: candidates, storage keys and terminal outcomes.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::constants::HEIF_EXTENSIONS;
use crate::error::{ErrorClass, ErrorMetadata, RejectionReason, UploadError};

/// Lower-cased extension of `name`, or an empty string when the name has no `.`.
///
/// Only the final component counts, so `archive.tar.PNG` yields `png` and `photo.`
/// yields `""`.
pub fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// MIME type used when writing an object with the given extension.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "application/octet-stream",
    }
}

/// The file moving through the pipeline.
///
/// Never mutated in place: normalization and reduction produce a derived candidate via
/// [`UploadCandidate::derive`].
#[derive(Clone, Debug)]
pub struct UploadCandidate {
    raw_bytes: Bytes,
    declared_name: String,
    declared_size_bytes: u64,
    extension: String,
    declared_mime: Option<String>,
}

impl UploadCandidate {
    /// Candidate whose declared size is the length of `raw_bytes`.
    pub fn new(declared_name: impl Into<String>, raw_bytes: impl Into<Bytes>) -> Self {
        let raw_bytes = raw_bytes.into();
        let declared_size_bytes = raw_bytes.len() as u64;
        Self::with_declared_size(declared_name, raw_bytes, declared_size_bytes)
    }

    pub fn with_declared_size(
        declared_name: impl Into<String>,
        raw_bytes: impl Into<Bytes>,
        declared_size_bytes: u64,
    ) -> Self {
        let declared_name = declared_name.into();
        let extension = extension_of(&declared_name);
        Self {
            raw_bytes: raw_bytes.into(),
            declared_name,
            declared_size_bytes,
            extension,
            declared_mime: None,
        }
    }

    /// Attach the MIME type reported by the host, if any.
    pub fn with_declared_mime(mut self, mime: impl Into<String>) -> Self {
        let mime = mime.into();
        self.declared_mime = if mime.trim().is_empty() {
            None
        } else {
            Some(mime)
        };
        self
    }

    /// New candidate with replaced bytes and extension; the declared name is kept.
    pub fn derive(&self, raw_bytes: impl Into<Bytes>, extension: impl Into<String>) -> Self {
        let raw_bytes = raw_bytes.into();
        let extension = extension.into();
        Self {
            declared_size_bytes: raw_bytes.len() as u64,
            declared_mime: Some(content_type_for_extension(&extension).to_string()),
            raw_bytes,
            declared_name: self.declared_name.clone(),
            extension,
        }
    }

    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }

    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn declared_size_bytes(&self) -> u64 {
        self.declared_size_bytes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    pub fn byte_len(&self) -> usize {
        self.raw_bytes.len()
    }

    pub fn is_heif(&self) -> bool {
        HEIF_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for_extension(&self.extension)
    }
}

/// Unique object name for one accepted upload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StorageKey {
    pub prefix: String,
    pub sequence_number: u64,
    pub random_suffix: String,
    pub extension: String,
}

impl StorageKey {
    /// Full object path, e.g. `images/image12V1StGXR8.png`.
    pub fn as_path(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}.{}",
            self.prefix,
            crate::constants::KEY_STEM,
            self.sequence_number,
            self.random_suffix,
            self.extension
        )
    }
}

/// Fetchable handle proving the object is retrievable after the write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoteReference {
    pub key: String,
    pub url: String,
}

/// Terminal result of one upload attempt. Never retried automatically.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Succeeded { reference: RemoteReference },
    Rejected { reason: RejectionReason },
    Failed { error: UploadError },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded { .. })
    }

    /// `None` for a successful upload.
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            UploadOutcome::Succeeded { .. } => None,
            UploadOutcome::Rejected { .. } => Some(ErrorClass::RejectedByPolicy),
            UploadOutcome::Failed { error } => Some(error.class()),
        }
    }

    pub fn reference(&self) -> Option<&RemoteReference> {
        match self {
            UploadOutcome::Succeeded { reference } => Some(reference),
            _ => None,
        }
    }
}
