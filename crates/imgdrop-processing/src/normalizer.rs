//! HEIC/HEIF to PNG conversion.
//!
//! Mobile cameras commonly produce HEIC, which most consumers of the stored objects
//! cannot display. The normalizer decodes it into a raster and re-encodes as PNG
//! before the size reducer sees it.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use imgdrop_core::{OutputFormat, UploadCandidate, UploadError};
use tempfile::NamedTempFile;

use crate::codec;

/// Decodes HEIC/HEIF containers into a raster image.
///
/// Called from a blocking thread, so implementations may do synchronous I/O.
pub trait HeifDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage>;
}

/// Decoder backed by an external `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegHeifDecoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegHeifDecoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl Default for FfmpegHeifDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl HeifDecoder for FfmpegHeifDecoder {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage> {
        let mut input_file = tempfile::Builder::new().suffix(".heic").tempfile()?;
        input_file.write_all(data)?;
        let input_path = input_file.into_temp_path();

        let output_file = NamedTempFile::with_suffix(".png")?;
        let output_path = output_file.path().to_path_buf();

        // First frame only; multi-image containers keep their primary image.
        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input_path.as_os_str())
            .arg("-frames:v")
            .arg("1")
            .arg(&output_path)
            .output()
            .with_context(|| format!("Failed to run {}", self.ffmpeg_path.display()))?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ffmpeg failed on HEIC/HEIF: {}", err_msg.trim()));
        }

        let png_data = std::fs::read(&output_path)?;
        image::load_from_memory(&png_data)
            .map_err(|e| anyhow!("Failed to load HEIC frame: {}", e))
    }
}

/// Converts HEIF-family candidates to PNG; passes everything else through.
#[derive(Clone)]
pub struct FormatNormalizer {
    decoder: Arc<dyn HeifDecoder>,
}

impl FormatNormalizer {
    pub fn new(decoder: Arc<dyn HeifDecoder>) -> Self {
        Self { decoder }
    }

    pub fn with_ffmpeg(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FfmpegHeifDecoder::new(ffmpeg_path)))
    }

    pub fn applies_to(&self, candidate: &UploadCandidate) -> bool {
        candidate.is_heif()
    }

    /// PNG candidate for HEIC/HEIF input, the unchanged candidate otherwise.
    ///
    /// Any decode or encode failure is a `Conversion` error.
    pub async fn normalize(&self, candidate: UploadCandidate) -> Result<UploadCandidate, UploadError> {
        if !self.applies_to(&candidate) {
            return Ok(candidate);
        }

        let start = Instant::now();
        let decoder = Arc::clone(&self.decoder);
        let data = candidate.raw_bytes().clone();
        let input_size = data.len();

        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let img = decoder.decode(&data)?;
            codec::encode(&img, OutputFormat::Png, 100)
        })
        .await
        .map_err(|e| UploadError::Conversion(format!("Conversion task failed: {}", e)))?
        .map_err(|e| UploadError::Conversion(format!("{:#}", e)))?;

        tracing::info!(
            name = %candidate.declared_name(),
            from = %candidate.extension(),
            input_size_bytes = input_size,
            size_bytes = png.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Converted HEIF image to PNG"
        );

        Ok(candidate.derive(png, OutputFormat::Png.extension()))
    }
}
