//! imgdrop Image Processing Library
//!
//! This crate provides the format-specific stages of the upload pipeline:
//! - Format validation against the configured allow-set and size ceiling (validator)
//! - HEIC/HEIF to PNG conversion (normalizer)
//! - Size-aware resize and recompression (reducer)

pub mod codec;
pub mod normalizer;
pub mod reducer;
pub mod validator;

// Re-export commonly used types
pub use normalizer::{FfmpegHeifDecoder, FormatNormalizer, HeifDecoder};
pub use reducer::SizeReducer;
pub use validator::{FormatValidator, ValidationError};
