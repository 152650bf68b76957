//! JPEG encoder
//!
//! Compresses RGB frames with the `image` crate's JPEG codec. Frames the
//! camera already encoded as JPEG pass through untouched, so hardware MJPEG
//! sources pay no transcoding cost.

use bytes::Bytes;
use image::codecs::jpeg;
use image::ExtendedColorType;

use crate::source::{PixelFormat, RawFrame};

use super::{EncodeError, FrameEncoder};

/// Default JPEG quality (0-100)
pub const DEFAULT_QUALITY: u8 = 80;

/// JPEG still-image encoder
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// Create an encoder with the default quality
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_QUALITY)
    }

    /// Create an encoder with a specific quality (clamped to 1..=100)
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Configured quality
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, raw: &RawFrame) -> Result<Bytes, EncodeError> {
        match raw.format {
            PixelFormat::Jpeg => Ok(raw.data.clone()),
            PixelFormat::Rgb8 => {
                let expected = raw.width as usize * raw.height as usize * 3;
                if raw.data.len() != expected {
                    return Err(EncodeError(format!(
                        "rgb buffer is {} bytes, expected {} for {}x{}",
                        raw.data.len(),
                        expected,
                        raw.width,
                        raw.height
                    )));
                }

                let mut out = Vec::new();
                jpeg::JpegEncoder::new_with_quality(&mut out, self.quality)
                    .encode(&raw.data, raw.width, raw.height, ExtendedColorType::Rgb8)
                    .map_err(|e| EncodeError(e.to_string()))?;
                Ok(Bytes::from(out))
            }
        }
    }

    fn content_type(&self) -> &'static str {
        "image/jpeg"
    }
}
