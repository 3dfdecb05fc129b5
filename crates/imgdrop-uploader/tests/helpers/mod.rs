#![allow(dead_code)]

use std::io::Cursor;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgdrop_core::UploaderConfig;
use imgdrop_processing::HeifDecoder;
use imgdrop_storage::MemoryStorage;
use imgdrop_uploader::{AuthorizationContext, Notification, Notifier, Session, UploadOrchestrator};

pub const TOKEN: &str = "E1Hsvc3k";

/// Incompressible test image.
pub fn noise(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x2545_F491;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    }))
}

pub fn jpeg_bytes(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        .unwrap();
    buffer
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 144, 255])));
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png).unwrap();
    cursor.into_inner()
}

/// A camera-sized JPEG of roughly 3 MB, below the 1920 px bound.
pub fn camera_jpeg() -> Vec<u8> {
    let (mut width, mut height) = (1200, 900);
    loop {
        let data = jpeg_bytes(&noise(width, height), 95);
        if data.len() >= 2_500_000 || width >= 1900 {
            return data;
        }
        width += 140;
        height += 105;
    }
}

/// Decoder that returns a fixed raster, standing in for ffmpeg.
pub struct StubDecoder;

impl HeifDecoder for StubDecoder {
    fn decode(&self, _data: &[u8]) -> anyhow::Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            320,
            240,
            Rgb([12, 200, 90]),
        )))
    }
}

pub struct FailingDecoder;

impl HeifDecoder for FailingDecoder {
    fn decode(&self, _data: &[u8]) -> anyhow::Result<DynamicImage> {
        Err(anyhow!("unsupported HEIF brand"))
    }
}

/// Blocks each decode until the test sends on the paired channel.
pub struct GatedDecoder {
    release: Mutex<Receiver<()>>,
}

impl GatedDecoder {
    pub fn new(release: Receiver<()>) -> Self {
        Self {
            release: Mutex::new(release),
        }
    }
}

impl HeifDecoder for GatedDecoder {
    fn decode(&self, data: &[u8]) -> anyhow::Result<DynamicImage> {
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| anyhow!("release channel closed"))?;
        StubDecoder.decode(data)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.seen.lock().unwrap().push(notification.clone());
    }
}

pub fn session(client: Option<&str>, server: Option<&str>, initial_count: u64) -> Session {
    Session {
        auth: AuthorizationContext::new(client.map(String::from), server.map(String::from)),
        initial_count,
    }
}

/// Orchestrator over a fresh memory store with the gate open and a stub decoder.
pub fn open_orchestrator() -> (Arc<MemoryStorage>, UploadOrchestrator) {
    orchestrator_with(session(Some(TOKEN), Some(TOKEN), 0))
}

pub fn orchestrator_with(session: Session) -> (Arc<MemoryStorage>, UploadOrchestrator) {
    let memory = Arc::new(MemoryStorage::new());
    let orchestrator = UploadOrchestrator::new(&UploaderConfig::default(), memory.clone(), session)
        .with_heif_decoder(Arc::new(StubDecoder));
    (memory, orchestrator)
}
