//! Runtime control surface
//!
//! Applies named option changes (rotation, brightness, ...) to the capture
//! configuration. The channel owns the single authoritative
//! `CaptureConfig`; every apply builds a full updated copy, forwards it to
//! the broadcaster for an atomic swap, and commits the copy only if the
//! device accepted it. Entirely off the frame hot path.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::broadcast::FrameBroadcaster;
use crate::config::{CaptureConfig, Rotation};
use crate::source::CaptureError;

/// Error applying a control option
#[derive(Debug, Clone)]
pub enum ControlError {
    /// The option name or value was rejected
    Rejected(String),
    /// The broadcaster is no longer running
    Unavailable,
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            ControlError::Unavailable => write!(f, "Capture source unavailable"),
        }
    }
}

impl std::error::Error for ControlError {}

/// Forwards configuration changes to the broadcaster's capture loop
pub struct ControlChannel {
    broadcaster: Arc<FrameBroadcaster>,
    current: Mutex<CaptureConfig>,
}

impl ControlChannel {
    /// Create a control channel seeded with the active configuration
    pub fn new(broadcaster: Arc<FrameBroadcaster>, initial: CaptureConfig) -> Self {
        Self {
            broadcaster,
            current: Mutex::new(initial),
        }
    }

    /// The configuration as last successfully applied
    pub async fn current(&self) -> CaptureConfig {
        self.current.lock().await.clone()
    }

    /// Apply one named option
    ///
    /// Known names: `rotation` (degrees), `brightness`, `contrast`,
    /// `resolution` (`WIDTHxHEIGHT`). Parse failures are rejected locally;
    /// range validation is the frame source's call. A rejected apply leaves
    /// the authoritative configuration untouched.
    pub async fn apply(&self, name: &str, value: &str) -> Result<(), ControlError> {
        let mut current = self.current.lock().await;
        let updated = update_option(current.clone(), name, value)?;

        match self.broadcaster.apply_config(updated.clone()).await {
            Ok(()) => {
                tracing::info!(option = name, value = value, "Control option applied");
                *current = updated;
                Ok(())
            }
            Err(CaptureError::ConfigRejected(msg)) => Err(ControlError::Rejected(msg)),
            Err(CaptureError::DeviceUnavailable(_)) => Err(ControlError::Unavailable),
        }
    }
}

fn update_option(
    mut config: CaptureConfig,
    name: &str,
    value: &str,
) -> Result<CaptureConfig, ControlError> {
    match name {
        "rotation" => {
            let degrees: u32 = value
                .parse()
                .map_err(|_| ControlError::Rejected(format!("invalid rotation '{}'", value)))?;
            config.rotation = Rotation::from_degrees(degrees).ok_or_else(|| {
                ControlError::Rejected(format!("rotation must be 0/90/180/270, got {}", degrees))
            })?;
        }
        "brightness" => {
            config.brightness = value
                .parse()
                .map_err(|_| ControlError::Rejected(format!("invalid brightness '{}'", value)))?;
        }
        "contrast" => {
            config.contrast = value
                .parse()
                .map_err(|_| ControlError::Rejected(format!("invalid contrast '{}'", value)))?;
        }
        "resolution" => {
            let (w, h) = value
                .split_once('x')
                .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
                .ok_or_else(|| {
                    ControlError::Rejected(format!(
                        "resolution must be WIDTHxHEIGHT, got '{}'",
                        value
                    ))
                })?;
            config.resolution = (w, h);
        }
        other => {
            return Err(ControlError::Rejected(format!(
                "unknown option '{}'",
                other
            )));
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::broadcast::BroadcasterConfig;
    use crate::encode::JpegEncoder;
    use crate::source::SyntheticSource;

    fn harness() -> (Arc<FrameBroadcaster>, ControlChannel) {
        let initial = CaptureConfig::default().resolution(32, 24);
        let broadcaster = Arc::new(FrameBroadcaster::spawn(
            SyntheticSource::new(200),
            JpegEncoder::new(),
            initial.clone(),
            BroadcasterConfig::default(),
        ));
        let control = ControlChannel::new(Arc::clone(&broadcaster), initial);
        (broadcaster, control)
    }

    #[tokio::test]
    async fn test_apply_known_options() {
        let (broadcaster, control) = harness();

        control.apply("rotation", "180").await.unwrap();
        control.apply("brightness", "25").await.unwrap();
        control.apply("resolution", "64x48").await.unwrap();

        let current = control.current().await;
        assert_eq!(current.rotation, Rotation::Deg180);
        assert_eq!(current.brightness, 25);
        assert_eq!(current.resolution, (64, 48));

        broadcaster.shutdown();
        broadcaster.await_stopped().await;
    }

    #[tokio::test]
    async fn test_unknown_option_rejected_locally() {
        let (broadcaster, control) = harness();

        let result = control.apply("zoom", "2").await;
        assert!(matches!(result, Err(ControlError::Rejected(_))));

        broadcaster.shutdown();
        broadcaster.await_stopped().await;
    }

    #[tokio::test]
    async fn test_device_rejection_leaves_config_untouched() {
        let (broadcaster, control) = harness();

        // Parses fine, but the synthetic source rejects the range.
        let result = control.apply("brightness", "900").await;
        assert!(matches!(result, Err(ControlError::Rejected(_))));
        assert_eq!(control.current().await.brightness, 0);

        // Ongoing capture is unaffected by the rejected apply.
        let mut rx = broadcaster.subscribe().unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if rx.borrow_and_update().frame().is_some() {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("capture stalled after rejected apply");

        broadcaster.shutdown();
        broadcaster.await_stopped().await;
    }

    #[tokio::test]
    async fn test_invalid_rotation_value() {
        let (broadcaster, control) = harness();

        assert!(control.apply("rotation", "45").await.is_err());
        assert!(control.apply("rotation", "sideways").await.is_err());
        assert_eq!(control.current().await.rotation, Rotation::Deg0);

        broadcaster.shutdown();
        broadcaster.await_stopped().await;
    }
}
