//! Frame sources
//!
//! A `FrameSource` wraps one capture device. The broadcaster drives it from
//! a single dedicated thread, so the trait is blocking and needs no internal
//! locking: `configure` and `capture_next` are serialized by the caller.
//!
//! Hardware drivers (V4L2, vendor SDKs) live behind this trait outside the
//! crate; the built-in [`SyntheticSource`] generates a test pattern for
//! demos and tests.

pub mod synthetic;

pub use synthetic::SyntheticSource;

use bytes::Bytes;

use crate::config::CaptureConfig;

/// Pixel format of a raw captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, needs encoding before streaming
    Rgb8,
    /// Camera-side JPEG, streamed as-is
    Jpeg,
}

/// One frame as delivered by the capture device
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Pixel data (zero-copy via reference counting)
    pub data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of `data`
    pub format: PixelFormat,
}

/// Error from a capture device
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// The sensor is disconnected or busy
    ///
    /// Transient from the source's point of view; the broadcaster retries
    /// with backoff and escalates to a terminal failure after its budget.
    DeviceUnavailable(String),
    /// A configuration value the device cannot honor
    ///
    /// Local to the `configure` call; ongoing capture is unaffected.
    ConfigRejected(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CaptureError::ConfigRejected(msg) => write!(f, "Config rejected: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// A capture device producing raw frames
///
/// Driven from one thread; calls are never concurrent with each other.
pub trait FrameSource: Send + 'static {
    /// Apply a new configuration
    ///
    /// Called between captures, never concurrently with `capture_next`.
    /// Returns `ConfigRejected` for values the device cannot honor, leaving
    /// the previous configuration in effect.
    fn configure(&mut self, config: &CaptureConfig) -> Result<(), CaptureError>;

    /// Capture the next frame, blocking until the sensor delivers one
    fn capture_next(&mut self) -> Result<RawFrame, CaptureError>;
}
