use imgdrop_core::{RejectionReason, UploadCandidate, UploaderConfig};

/// Reasons a candidate is refused before any processing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid file extension: {extension:?} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Content type {content_type} does not match extension {extension}")]
    ContentTypeMismatch {
        extension: String,
        content_type: String,
    },
}

impl From<ValidationError> for RejectionReason {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TooLarge { size, max } => RejectionReason::TooLarge { size, max },
            ValidationError::InvalidExtension { extension, .. }
            | ValidationError::ContentTypeMismatch { extension, .. } => {
                RejectionReason::InvalidFormat { extension }
            }
        }
    }
}

/// Content types a host may report for an image extension.
///
/// `None` for extensions without a known mapping, which skips the cross-check.
fn expected_content_types(extension: &str) -> Option<&'static [&'static str]> {
    match extension {
        "jpg" | "jpeg" => Some(&["image/jpeg", "image/jpg", "image/pjpeg"]),
        "png" => Some(&["image/png"]),
        "webp" => Some(&["image/webp"]),
        "heic" | "heif" => Some(&[
            "image/heic",
            "image/heif",
            "image/heic-sequence",
            "image/heif-sequence",
        ]),
        "gif" => Some(&["image/gif"]),
        "avif" => Some(&["image/avif"]),
        _ => None,
    }
}

/// Classifies a candidate by extension and declared MIME type.
///
/// Pure: never reads or changes the candidate's bytes.
#[derive(Clone, Debug)]
pub struct FormatValidator {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl FormatValidator {
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(config.max_file_size_bytes, config.allowed_extensions.clone())
    }

    /// Validate declared size
    ///
    /// Checked before the format so an oversize file is `TooLarge` whatever its type.
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate the (already lower-cased) extension against the allow-set.
    ///
    /// An empty extension (no `.` in the name) is never allowed.
    pub fn validate_extension(&self, extension: &str) -> Result<(), ValidationError> {
        if extension.is_empty() || !self.allowed_extensions.iter().any(|e| e == extension) {
            return Err(ValidationError::InvalidExtension {
                extension: extension.to_string(),
                allowed: self.allowed_extensions.clone(),
            });
        }
        Ok(())
    }

    /// Validate that a declared content type matches the extension.
    pub fn validate_extension_content_type_match(
        &self,
        extension: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let Some(expected) = expected_content_types(extension) else {
            return Ok(());
        };

        // Drop parameters such as "; charset=binary".
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        if !expected.contains(&essence.as_str()) {
            return Err(ValidationError::ContentTypeMismatch {
                extension: extension.to_string(),
                content_type: content_type.to_string(),
            });
        }
        Ok(())
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> Result<(), ValidationError> {
        self.validate_file_size(candidate.declared_size_bytes())?;
        self.validate_extension(candidate.extension())?;
        if let Some(content_type) = candidate.declared_mime() {
            self.validate_extension_content_type_match(candidate.extension(), content_type)?;
        }
        Ok(())
    }
}
