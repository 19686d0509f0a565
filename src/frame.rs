//! Captured visuals.
//!
//! - `VisualFrame`: immutable RGB snapshot from a live device or an upload.
//! - `EncodedImage`: the original encoded bytes of an upload, kept so the
//!   upload path can submit exactly what the user picked.
//!
//! Frames are shared by reference count. A frame handed to a detection cycle
//! is the same frame the renderer paints, which is what ties a detection list
//! to the raster it was computed from.

use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Original encoded form of an uploaded image.
#[derive(Clone, Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

struct FrameData {
    id: u64,
    pixels: RgbImage,
    encoded: Option<EncodedImage>,
    captured_at: Instant,
}

/// One captured raster. Cloning shares the pixels; there is no mutable access.
#[derive(Clone)]
pub struct VisualFrame {
    inner: Arc<FrameData>,
}

impl VisualFrame {
    /// Wrap decoded RGB pixels.
    pub fn from_image(pixels: RgbImage) -> Self {
        Self::build(pixels, None)
    }

    /// Wrap a packed RGB24 buffer. Fails when the length does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self::from_image(image))
    }

    /// Decode encoded image bytes, keeping the originals alongside the pixels.
    pub fn decode(bytes: Vec<u8>, mime: &str) -> std::result::Result<Self, image::ImageError> {
        let pixels = image::load_from_memory(&bytes)?.into_rgb8();
        Ok(Self::build(
            pixels,
            Some(EncodedImage {
                bytes,
                mime: mime.to_string(),
            }),
        ))
    }

    fn build(pixels: RgbImage, encoded: Option<EncodedImage>) -> Self {
        Self {
            inner: Arc::new(FrameData {
                id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
                pixels,
                encoded,
                captured_at: Instant::now(),
            }),
        }
    }

    /// Process-unique frame identifier, increasing in capture order.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn width(&self) -> u32 {
        self.inner.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.inner.pixels
    }

    /// Original encoded bytes, present for uploads only.
    pub fn encoded(&self) -> Option<&EncodedImage> {
        self.inner.encoded.as_ref()
    }

    pub fn age(&self) -> Duration {
        self.inner.captured_at.elapsed()
    }

    /// Lossy JPEG encoding used for inline submission.
    pub fn encode_jpeg(&self, quality: u8) -> std::result::Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode_image(&self.inner.pixels)?;
        Ok(out)
    }

    /// True when both handles refer to the same captured frame.
    pub fn same_frame(&self, other: &VisualFrame) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for VisualFrame {
    // Pixel content stays out of logs and debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualFrame")
            .field("id", &self.id())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("encoded", &self.encoded().map(|e| e.mime.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn from_rgb_validates_length() {
        assert!(VisualFrame::from_rgb(2, 2, vec![0u8; 12]).is_ok());
        assert!(VisualFrame::from_rgb(2, 2, vec![0u8; 11]).is_err());
    }

    #[test]
    fn decode_keeps_original_bytes() {
        let bytes = png_bytes(4, 3);
        let frame = VisualFrame::decode(bytes.clone(), "image/png").unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        let encoded = frame.encoded().unwrap();
        assert_eq!(encoded.bytes, bytes);
        assert_eq!(encoded.mime, "image/png");
    }

    #[test]
    fn frame_ids_increase_and_clones_share() {
        let a = VisualFrame::from_image(RgbImage::new(1, 1));
        let b = VisualFrame::from_image(RgbImage::new(1, 1));
        assert!(b.id() > a.id());
        let a2 = a.clone();
        assert!(a.same_frame(&a2));
        assert!(!a.same_frame(&b));
    }

    #[test]
    fn jpeg_encoding_round_trips_dimensions() {
        let frame = VisualFrame::from_image(RgbImage::from_pixel(8, 6, Rgb([200, 0, 0])));
        let jpeg = frame.encode_jpeg(92).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }
}
