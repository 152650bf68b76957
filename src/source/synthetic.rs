//! Synthetic frame source
//!
//! Generates a deterministic moving test pattern at a fixed native rate.
//! Stands in for real camera hardware in demos and tests, and exercises the
//! same configure/capture contract a device driver would.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::CaptureConfig;

use super::{CaptureError, FrameSource, PixelFormat, RawFrame};

const MAX_DIMENSION: u32 = 4096;

/// Test-pattern source
///
/// Produces packed RGB frames: a static gradient plus a vertical bar that
/// advances one step per frame. Honors rotation (output dimensions),
/// brightness, and contrast from the active configuration.
pub struct SyntheticSource {
    config: CaptureConfig,
    native_interval: Duration,
    frame_index: u64,
    last_capture: Option<Instant>,
}

impl SyntheticSource {
    /// Create a source producing frames at the given native rate
    pub fn new(native_fps: u32) -> Self {
        let fps = native_fps.max(1);
        Self {
            config: CaptureConfig::default(),
            native_interval: Duration::from_secs(1) / fps,
            frame_index: 0,
            last_capture: None,
        }
    }

    /// Number of frames generated so far
    pub fn frames_generated(&self) -> u64 {
        self.frame_index
    }

    fn validate(config: &CaptureConfig) -> Result<(), CaptureError> {
        if !(-100..=100).contains(&config.brightness) {
            return Err(CaptureError::ConfigRejected(format!(
                "brightness {} out of range -100..=100",
                config.brightness
            )));
        }
        if !(-100..=100).contains(&config.contrast) {
            return Err(CaptureError::ConfigRejected(format!(
                "contrast {} out of range -100..=100",
                config.contrast
            )));
        }
        let (w, h) = config.resolution;
        if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(CaptureError::ConfigRejected(format!(
                "resolution {}x{} unsupported",
                w, h
            )));
        }
        Ok(())
    }

    fn render(&self) -> RawFrame {
        let (width, height) = self.config.output_dimensions();
        let bar_x = (self.frame_index % width as u64) as u32;
        let brightness = self.config.brightness * 255 / 100;
        // Contrast as a fixed-point gain around mid-gray: -100 -> 0x, 100 -> 2x.
        let gain = 256 + self.config.contrast * 256 / 100;

        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 255 / width.max(1)) as i32;
                let g = (y * 255 / height.max(1)) as i32;
                let b = if x == bar_x { 255 } else { 32 };
                for c in [r, g, b] {
                    let adjusted = (c - 128) * gain / 256 + 128 + brightness;
                    data.push(adjusted.clamp(0, 255) as u8);
                }
            }
        }

        RawFrame {
            data: Bytes::from(data),
            width,
            height,
            format: PixelFormat::Rgb8,
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_capture {
            let elapsed = last.elapsed();
            if elapsed < self.native_interval {
                std::thread::sleep(self.native_interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());
    }
}

impl FrameSource for SyntheticSource {
    fn configure(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        Self::validate(config)?;
        self.config = config.clone();
        Ok(())
    }

    fn capture_next(&mut self) -> Result<RawFrame, CaptureError> {
        self.pace();
        let frame = self.render();
        self.frame_index += 1;
        Ok(frame)
    }
}
