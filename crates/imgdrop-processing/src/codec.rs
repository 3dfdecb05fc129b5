//! Raster decode/encode helpers shared by the normalizer and the reducer.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageReader};
use imgdrop_core::OutputFormat;

/// Decode any raster the `image` crate understands, sniffing the format from content.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to read image header")?
        .decode()
        .context("Failed to decode image")?;
    Ok(img)
}

/// Encode `img` into `format`. `quality` (1-100) applies to JPEG and WebP.
pub fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => encode_png(img),
        OutputFormat::WebP => encode_webp(img, quality),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .context("Failed to encode JPEG")?;
    Ok(buffer)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .context("Failed to encode PNG")?;
    Ok(buffer)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let rgba_img = img.to_rgba8();

    let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
    let webp_data = encoder.encode(f32::from(quality.clamp(1, 100)));

    Ok(webp_data.to_vec())
}
