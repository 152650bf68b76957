//! Capture configuration
//!
//! `CaptureConfig` is the single authoritative set of sensor options. It is
//! owned by the `ControlChannel` and handed to the capture loop by
//! full-struct replacement, never by field-at-a-time mutation, so the
//! capture loop can never observe a half-applied update.

/// Image rotation applied at the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation
    #[default]
    Deg0,
    /// 90 degrees clockwise
    Deg90,
    /// 180 degrees
    Deg180,
    /// 270 degrees clockwise
    Deg270,
}

impl Rotation {
    /// Parse a rotation from degrees
    pub fn from_degrees(deg: u32) -> Option<Self> {
        match deg {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Rotation in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether this rotation swaps frame width and height
    pub fn transposes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Sensor capture options
///
/// Range validation is the frame source's job (`configure` returns
/// `ConfigRejected` for values the device cannot honor); this struct only
/// carries the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Image rotation
    pub rotation: Rotation,

    /// Brightness adjustment, nominally -100..=100
    pub brightness: i32,

    /// Contrast adjustment, nominally -100..=100
    pub contrast: i32,

    /// Capture resolution (width, height) before rotation
    pub resolution: (u32, u32),
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            brightness: 0,
            contrast: 0,
            resolution: (640, 480),
        }
    }
}

impl CaptureConfig {
    /// Set the rotation
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the brightness
    pub fn brightness(mut self, brightness: i32) -> Self {
        self.brightness = brightness;
        self
    }

    /// Set the contrast
    pub fn contrast(mut self, contrast: i32) -> Self {
        self.contrast = contrast;
        self
    }

    /// Set the capture resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    /// Frame dimensions after rotation is applied
    pub fn output_dimensions(&self) -> (u32, u32) {
        let (w, h) = self.resolution;
        if self.rotation.transposes() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();

        assert_eq!(config.rotation, Rotation::Deg0);
        assert_eq!(config.brightness, 0);
        assert_eq!(config.contrast, 0);
        assert_eq!(config.resolution, (640, 480));
    }

    #[test]
    fn test_builder_chaining() {
        let config = CaptureConfig::default()
            .rotation(Rotation::Deg180)
            .brightness(20)
            .contrast(-10)
            .resolution(1280, 720);

        assert_eq!(config.rotation, Rotation::Deg180);
        assert_eq!(config.brightness, 20);
        assert_eq!(config.contrast, -10);
        assert_eq!(config.resolution, (1280, 720));
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(180), Some(Rotation::Deg180));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_output_dimensions_transposed() {
        let config = CaptureConfig::default()
            .resolution(640, 480)
            .rotation(Rotation::Deg90);

        assert_eq!(config.output_dimensions(), (480, 640));

        let config = config.rotation(Rotation::Deg180);
        assert_eq!(config.output_dimensions(), (640, 480));
    }
}
