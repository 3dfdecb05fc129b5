use std::time::Instant;

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use imgdrop_core::{OutputFormat, ReduceConfig, ReducePolicy, UploadCandidate, UploadError};

use crate::codec;

/// Lowest quality the size cap may step down to.
const MIN_QUALITY: u8 = 10;
const QUALITY_STEP: u8 = 10;

enum Reduced {
    /// Re-encoded bytes and the quality they were encoded at.
    Encoded(Vec<u8>, u8),
    KeepInput,
}

/// Resizes and recompresses accepted images according to a [`ReducePolicy`].
#[derive(Clone, Debug)]
pub struct SizeReducer {
    config: ReduceConfig,
}

impl SizeReducer {
    pub fn new(config: ReduceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReduceConfig {
        &self.config
    }

    /// Whether `reduce` would touch this candidate.
    pub fn should_reduce(&self, candidate: &UploadCandidate) -> bool {
        match self.config.policy {
            ReducePolicy::Disabled => false,
            ReducePolicy::BoundingBox => true,
            ReducePolicy::Conditional => candidate.byte_len() as u64 > self.config.threshold_bytes,
        }
    }

    /// Target dimensions: the longer edge scaled down to `max_dimension`, the other
    /// proportionally. Never upscales.
    pub fn calculate_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
        let longer = width.max(height);
        if longer <= max_dimension || max_dimension == 0 {
            return (width, height);
        }

        let scale = max_dimension as f64 / longer as f64;
        let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).clamp(1, max_dimension);
        if width >= height {
            (max_dimension, scaled(height))
        } else {
            (scaled(width), max_dimension)
        }
    }

    /// Select appropriate filter type based on resize ratio
    fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Format the candidate is re-encoded into, and the extension it ends up with.
    fn target_format(&self, candidate: &UploadCandidate) -> (OutputFormat, String) {
        let own = OutputFormat::from_extension(candidate.extension());
        let format = self.config.output_format.or(own).unwrap_or(OutputFormat::Png);
        // Keep "jpeg" vs "jpg" as the user named it when the format is unchanged.
        let extension = if own == Some(format) {
            candidate.extension().to_string()
        } else {
            format.extension().to_string()
        };
        (format, extension)
    }

    /// Reduce `candidate` if the policy calls for it.
    ///
    /// Any decode or encode failure is a `Compression` error; the caller must not fall
    /// back to uploading the original.
    ///
    /// Under [`ReducePolicy::Conditional`] the output is never larger than the input.
    /// A lossy output that grew is re-encoded at stepped-down quality. If it still does
    /// not fit, an image that needed no resize keeps its input bytes (and format), and a
    /// resized one fails with `Compression`.
    pub async fn reduce(&self, candidate: UploadCandidate) -> Result<UploadCandidate, UploadError> {
        if !self.should_reduce(&candidate) {
            return Ok(candidate);
        }

        let start = Instant::now();
        let (format, extension) = self.target_format(&candidate);
        let same_format = extension == candidate.extension();
        let max_dimension = self.config.max_dimension;
        let quality = self.config.quality;
        let size_cap = (self.config.policy == ReducePolicy::Conditional).then(|| candidate.byte_len());
        let data = candidate.raw_bytes().clone();

        let (reduced, resized) = tokio::task::spawn_blocking(move || -> Result<(Reduced, bool)> {
            let img = codec::decode(&data)?;
            let (img, resized) = Self::fit_within(img, max_dimension);
            let encoded = codec::encode(&img, format, quality)?;

            let Some(cap) = size_cap else {
                return Ok((Reduced::Encoded(encoded, quality), resized));
            };
            if encoded.len() <= cap {
                return Ok((Reduced::Encoded(encoded, quality), resized));
            }
            // Same format, already within bounds: the input is the better encoding.
            if !resized && same_format {
                return Ok((Reduced::KeepInput, resized));
            }
            if let Some((smaller, used)) = Self::encode_within(&img, format, quality, cap)? {
                return Ok((Reduced::Encoded(smaller, used), resized));
            }
            if !resized {
                return Ok((Reduced::KeepInput, resized));
            }
            Err(anyhow!(
                "Resized image does not fit in {} bytes at minimum quality",
                cap
            ))
        })
        .await
        .map_err(|e| UploadError::Compression(format!("Compression task failed: {}", e)))?
        .map_err(|e| UploadError::Compression(format!("{:#}", e)))?;

        let (encoded, used_quality) = match reduced {
            Reduced::Encoded(encoded, used_quality) => (encoded, used_quality),
            Reduced::KeepInput => {
                tracing::debug!(
                    name = %candidate.declared_name(),
                    size_bytes = candidate.byte_len(),
                    "Re-encode did not shrink image, keeping input"
                );
                return Ok(candidate);
            }
        };

        tracing::info!(
            name = %candidate.declared_name(),
            input_size_bytes = candidate.byte_len(),
            size_bytes = encoded.len(),
            resized,
            quality = used_quality,
            format = %extension,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Reduced image"
        );

        Ok(candidate.derive(encoded, extension))
    }

    /// Lossy re-encode at decreasing quality until the output fits in `cap` bytes.
    ///
    /// `None` for PNG or when even `MIN_QUALITY` is too large.
    fn encode_within(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
        cap: usize,
    ) -> Result<Option<(Vec<u8>, u8)>> {
        if format == OutputFormat::Png {
            return Ok(None);
        }
        let mut current = quality;
        while current > MIN_QUALITY {
            current = current.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
            let encoded = codec::encode(img, format, current)?;
            if encoded.len() <= cap {
                return Ok(Some((encoded, current)));
            }
        }
        Ok(None)
    }

    fn fit_within(img: DynamicImage, max_dimension: u32) -> (DynamicImage, bool) {
        let (width, height) = img.dimensions();
        let (new_width, new_height) = Self::calculate_dimensions(width, height, max_dimension);
        if (new_width, new_height) == (width, height) {
            return (img, false);
        }
        let filter = Self::select_filter(width, height, new_width, new_height);
        (img.resize_exact(new_width, new_height, filter), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Noisy image that compresses poorly, so it is large at high quality.
    fn noise(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x9E37_79B9;
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        }))
    }

    fn config(policy: ReducePolicy) -> ReduceConfig {
        ReduceConfig {
            policy,
            ..ReduceConfig::default()
        }
    }

    fn jpeg_candidate(name: &str, width: u32, height: u32, quality: u8) -> UploadCandidate {
        let data = codec::encode(&noise(width, height), OutputFormat::Jpeg, quality).unwrap();
        UploadCandidate::new(name, data)
    }

    #[test]
    fn test_calculate_dimensions_keeps_aspect_ratio() {
        assert_eq!(SizeReducer::calculate_dimensions(4000, 3000, 1920), (1920, 1440));
        assert_eq!(SizeReducer::calculate_dimensions(3000, 4000, 1920), (1440, 1920));
        assert_eq!(SizeReducer::calculate_dimensions(5000, 5000, 504), (504, 504));
        assert_eq!(SizeReducer::calculate_dimensions(10000, 3, 100), (100, 1));
    }

    #[test]
    fn test_calculate_dimensions_never_upscales() {
        assert_eq!(SizeReducer::calculate_dimensions(800, 600, 1920), (800, 600));
        assert_eq!(SizeReducer::calculate_dimensions(1920, 100, 1920), (1920, 100));
    }

    #[test]
    fn test_should_reduce_per_policy() {
        let small = UploadCandidate::new("a.png", vec![0u8; 1024]);
        let big = UploadCandidate::new("a.png", vec![0u8; 300 * 1024]);

        let conditional = SizeReducer::new(config(ReducePolicy::Conditional));
        assert!(!conditional.should_reduce(&small));
        assert!(conditional.should_reduce(&big));

        let always = SizeReducer::new(config(ReducePolicy::BoundingBox));
        assert!(always.should_reduce(&small));

        let disabled = SizeReducer::new(config(ReducePolicy::Disabled));
        assert!(!disabled.should_reduce(&big));
    }

    #[tokio::test]
    async fn test_small_candidate_passes_through() {
        let reducer = SizeReducer::new(config(ReducePolicy::Conditional));
        let candidate = UploadCandidate::new("tiny.png", vec![1u8; 10]);
        // Not an image at all; untouched because it is under the threshold.
        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert_eq!(out.raw_bytes(), candidate.raw_bytes());
    }

    #[tokio::test]
    async fn test_large_jpeg_is_bounded_and_smaller() {
        let reducer = SizeReducer::new(config(ReducePolicy::Conditional));
        let candidate = jpeg_candidate("camera.jpg", 2400, 1600, 95);
        assert!(candidate.byte_len() > 200 * 1024);

        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert!(out.byte_len() <= candidate.byte_len());
        assert_eq!(out.extension(), "jpg");

        let (w, h) = codec::decode(out.raw_bytes()).unwrap().dimensions();
        assert_eq!((w, h), (1920, 1280));
    }

    #[tokio::test]
    async fn test_conditional_never_grows_output() {
        // Already at low quality: a re-encode at 80 would be larger.
        let reducer = SizeReducer::new(config(ReducePolicy::Conditional));
        let candidate = jpeg_candidate("low.jpeg", 1200, 900, 10);
        let reducer = SizeReducer::new(ReduceConfig {
            threshold_bytes: (candidate.byte_len() as u64) - 1,
            ..reducer.config().clone()
        });

        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert!(out.byte_len() <= candidate.byte_len());
        assert_eq!(out.extension(), "jpeg");
    }

    #[tokio::test]
    async fn test_conditional_resize_never_grows_output() {
        // Low quality and above the bound: a resize at quality 80 alone would be larger.
        let reducer = SizeReducer::new(ReduceConfig::default());
        let candidate = jpeg_candidate("low_big.jpg", 2400, 1800, 10);
        assert!(candidate.byte_len() > 200 * 1024);

        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert!(
            out.byte_len() <= candidate.byte_len(),
            "output grew: {} > {}",
            out.byte_len(),
            candidate.byte_len()
        );
        let (w, h) = codec::decode(out.raw_bytes()).unwrap().dimensions();
        assert_eq!((w, h), (1920, 1440));
    }

    #[tokio::test]
    async fn test_format_change_that_cannot_shrink_keeps_input() {
        let candidate = jpeg_candidate("low.jpeg", 1200, 900, 10);
        let reducer = SizeReducer::new(ReduceConfig {
            threshold_bytes: (candidate.byte_len() as u64) - 1,
            output_format: Some(OutputFormat::Png),
            ..ReduceConfig::default()
        });

        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert_eq!(out.raw_bytes(), candidate.raw_bytes());
        assert_eq!(out.extension(), "jpeg");
    }

    #[tokio::test]
    async fn test_lossy_format_change_never_grows_output() {
        let candidate = jpeg_candidate("low.jpg", 1200, 900, 10);
        let reducer = SizeReducer::new(ReduceConfig {
            threshold_bytes: (candidate.byte_len() as u64) - 1,
            output_format: Some(OutputFormat::WebP),
            ..ReduceConfig::default()
        });

        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert!(out.byte_len() <= candidate.byte_len());
        assert!(codec::decode(out.raw_bytes()).is_ok());
    }

    #[tokio::test]
    async fn test_resized_output_that_cannot_shrink_is_compression_error() {
        let reducer = SizeReducer::new(ReduceConfig {
            output_format: Some(OutputFormat::Png),
            ..ReduceConfig::default()
        });
        let candidate = jpeg_candidate("low_big.jpg", 2400, 1800, 10);

        let result = reducer.reduce(candidate).await;
        assert!(matches!(result, Err(UploadError::Compression(_))));
    }

    #[tokio::test]
    async fn test_bounding_box_may_grow_output() {
        // The size cap belongs to the conditional policy only.
        let reducer = SizeReducer::new(ReduceConfig {
            policy: ReducePolicy::BoundingBox,
            ..ReduceConfig::default()
        });
        let candidate = jpeg_candidate("low.jpg", 600, 400, 10);

        let out = reducer.reduce(candidate.clone()).await.unwrap();
        assert!(out.byte_len() > candidate.byte_len());
    }

    #[tokio::test]
    async fn test_bounding_box_applies_to_small_images() {
        let reducer = SizeReducer::new(ReduceConfig {
            policy: ReducePolicy::BoundingBox,
            max_dimension: 504,
            ..ReduceConfig::default()
        });
        let candidate = jpeg_candidate("small.jpg", 1000, 500, 50);

        let out = reducer.reduce(candidate).await.unwrap();
        let (w, h) = codec::decode(out.raw_bytes()).unwrap().dimensions();
        assert_eq!((w, h), (504, 252));
    }

    #[tokio::test]
    async fn test_output_format_override() {
        let reducer = SizeReducer::new(ReduceConfig {
            policy: ReducePolicy::BoundingBox,
            output_format: Some(OutputFormat::WebP),
            ..ReduceConfig::default()
        });
        let data = codec::encode(&noise(64, 64), OutputFormat::Png, 100).unwrap();

        let out = reducer.reduce(UploadCandidate::new("a.png", data)).await.unwrap();
        assert_eq!(out.extension(), "webp");
        assert_eq!(out.declared_mime(), Some("image/webp"));
        assert!(codec::decode(out.raw_bytes()).is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_pixels_is_compression_error() {
        let reducer = SizeReducer::new(config(ReducePolicy::BoundingBox));
        let result = reducer
            .reduce(UploadCandidate::new("broken.png", b"\x89PNG\r\n\x1a\nnope".to_vec()))
            .await;
        assert!(matches!(result, Err(UploadError::Compression(_))));
    }
}
