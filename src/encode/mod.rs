//! Frame encoding
//!
//! Encoders turn raw captured frames into self-contained still images
//! suitable for multipart streaming. Encoding is a pure transformation that
//! runs inline on the capture thread; a per-frame failure is logged and the
//! frame skipped, capture continues.

pub mod jpeg;

pub use jpeg::JpegEncoder;

use bytes::Bytes;

use crate::source::RawFrame;

/// Error encoding a single frame
///
/// Non-fatal: the broadcaster skips the frame and keeps capturing.
#[derive(Debug, Clone)]
pub struct EncodeError(pub String);

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encode failed: {}", self.0)
    }
}

impl std::error::Error for EncodeError {}

/// Converts a raw frame into one encoded image payload
///
/// Stateless; safe to call repeatedly from the capture loop.
pub trait FrameEncoder: Send + 'static {
    /// Encode one raw frame
    fn encode(&self, raw: &RawFrame) -> Result<Bytes, EncodeError>;

    /// MIME type of the encoded payload
    fn content_type(&self) -> &'static str;
}
