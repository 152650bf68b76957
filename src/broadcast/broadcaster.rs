//! Frame broadcaster
//!
//! `FrameBroadcaster` owns the capture loop: a dedicated thread that pulls
//! raw frames from a `FrameSource`, encodes them, and atomically replaces
//! the current-frame slot observed by every session. The thread also owns
//! the source, so configuration changes are serialized against capture by
//! construction: they arrive through a mailbox and are applied between
//! capture calls as a full-struct swap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::CaptureConfig;
use crate::encode::FrameEncoder;
use crate::error::{Error, Result};
use crate::source::{CaptureError, FrameSource};

use super::config::BroadcasterConfig;
use super::frame::{BroadcasterState, EndReason, Frame, Publication};

/// Receiver side of the current-frame slot
pub type FrameReceiver = watch::Receiver<Publication>;

enum ControlRequest {
    Apply {
        config: CaptureConfig,
        reply: oneshot::Sender<std::result::Result<(), CaptureError>>,
    },
}

/// Handle to a running capture-and-publish loop
///
/// Eagerly started: spawning acquires the device immediately and the loop
/// runs until `shutdown` or terminal failure. Sessions subscribe for a
/// `FrameReceiver`; the control surface applies configuration through
/// `apply_config`.
pub struct FrameBroadcaster {
    frames: FrameReceiver,
    state: watch::Receiver<BroadcasterState>,
    control_tx: mpsc::Sender<ControlRequest>,
    shutdown: Arc<AtomicBool>,
    frames_published: Arc<AtomicU64>,
    thread: std::sync::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl FrameBroadcaster {
    /// Spawn the capture thread and start publishing
    ///
    /// The initial capture configuration is applied before the first frame;
    /// if the device rejects it, capture proceeds with device defaults.
    pub fn spawn<S, E>(
        source: S,
        encoder: E,
        capture_config: CaptureConfig,
        config: BroadcasterConfig,
    ) -> Self
    where
        S: FrameSource,
        E: FrameEncoder,
    {
        let (frames_tx, frames_rx) = watch::channel(Publication::Pending);
        let (state_tx, state_rx) = watch::channel(BroadcasterState::Starting);
        let (control_tx, control_rx) = mpsc::channel(config.control_queue_depth.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let frames_published = Arc::new(AtomicU64::new(0));

        let loop_shutdown = Arc::clone(&shutdown);
        let loop_published = Arc::clone(&frames_published);
        let handle = std::thread::Builder::new()
            .name("frame-capture".into())
            .spawn(move || {
                capture_loop(CaptureLoop {
                    source,
                    encoder,
                    capture_config,
                    config,
                    frames_tx,
                    state_tx,
                    control_rx,
                    shutdown: loop_shutdown,
                    frames_published: loop_published,
                });
            })
            .expect("failed to spawn capture thread");

        Self {
            frames: frames_rx,
            state: state_rx,
            control_tx,
            shutdown,
            frames_published,
            thread: std::sync::Mutex::new(Some(handle)),
        }
    }

    /// Subscribe to the current-frame slot
    ///
    /// Rejected once the broadcaster is in a terminal state; live sessions
    /// learn of a later failure through the `Ended` publication.
    pub fn subscribe(&self) -> Result<FrameReceiver> {
        match *self.state.borrow() {
            BroadcasterState::Failed => Err(Error::SourceUnavailable),
            BroadcasterState::Stopped => Err(Error::Shutdown),
            _ => Ok(self.frames.clone()),
        }
    }

    /// Apply a new capture configuration
    ///
    /// Forwarded to the capture thread and applied between captures as an
    /// atomic swap. `ConfigRejected` leaves the previous configuration in
    /// effect and never disturbs ongoing capture.
    pub async fn apply_config(
        &self,
        config: CaptureConfig,
    ) -> std::result::Result<(), CaptureError> {
        let (reply, response) = oneshot::channel();
        self.control_tx
            .send(ControlRequest::Apply { config, reply })
            .await
            .map_err(|_| CaptureError::DeviceUnavailable("capture loop stopped".into()))?;
        response
            .await
            .map_err(|_| CaptureError::DeviceUnavailable("capture loop stopped".into()))?
    }

    /// Current lifecycle state
    pub fn state(&self) -> BroadcasterState {
        *self.state.borrow()
    }

    /// Watch lifecycle state transitions
    pub fn state_changes(&self) -> watch::Receiver<BroadcasterState> {
        self.state.clone()
    }

    /// Total frames published so far
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Signal the capture loop to stop
    ///
    /// Idempotent. The loop publishes `Ended(Shutdown)` to all sessions and
    /// releases the device before exiting; completion is observable via
    /// [`await_stopped`](Self::await_stopped).
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait until the capture loop has reached a terminal state
    pub async fn await_stopped(&self) {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if matches!(
                current,
                BroadcasterState::Stopped | BroadcasterState::Failed
            ) {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Block until the capture thread has exited
    ///
    /// For synchronous teardown paths; async callers should prefer
    /// [`await_stopped`](Self::await_stopped).
    pub fn join(&self) {
        let handle = self.thread.lock().expect("thread handle lock").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

struct CaptureLoop<S, E> {
    source: S,
    encoder: E,
    capture_config: CaptureConfig,
    config: BroadcasterConfig,
    frames_tx: watch::Sender<Publication>,
    state_tx: watch::Sender<BroadcasterState>,
    control_rx: mpsc::Receiver<ControlRequest>,
    shutdown: Arc<AtomicBool>,
    frames_published: Arc<AtomicU64>,
}

fn capture_loop<S: FrameSource, E: FrameEncoder>(mut ctx: CaptureLoop<S, E>) {
    match ctx.source.configure(&ctx.capture_config) {
        Ok(()) => {}
        Err(CaptureError::ConfigRejected(msg)) => {
            tracing::warn!(error = %msg, "Initial configuration rejected, using device defaults");
        }
        Err(CaptureError::DeviceUnavailable(msg)) => {
            // Let the normal retry path decide whether this is fatal.
            tracing::warn!(error = %msg, "Device unavailable while configuring");
        }
    }

    ctx.state_tx.send_replace(BroadcasterState::Running);
    tracing::info!(
        retry_budget = ctx.config.retry.budget,
        frame_rate_cap = ?ctx.config.frame_rate_cap,
        "Capture loop running"
    );

    let min_interval = ctx.config.min_publish_interval();
    let content_type = ctx.encoder.content_type();
    let mut sequence: u64 = 0;
    let mut attempt: u32 = 0;
    let mut last_publish: Option<Instant> = None;

    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            tracing::info!(frames = sequence, "Capture loop shutting down");
            ctx.frames_tx
                .send_replace(Publication::Ended(EndReason::Shutdown));
            ctx.state_tx.send_replace(BroadcasterState::Stopped);
            return;
        }

        // Apply pending configuration changes between captures. The whole
        // struct is swapped, so capture never sees a torn config.
        while let Ok(ControlRequest::Apply { config, reply }) = ctx.control_rx.try_recv() {
            let result = ctx.source.configure(&config);
            match &result {
                Ok(()) => {
                    tracing::info!(config = ?config, "Capture configuration applied");
                    ctx.capture_config = config;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Capture configuration rejected");
                }
            }
            let _ = reply.send(result);
        }

        if let (Some(interval), Some(last)) = (min_interval, last_publish) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }

        match ctx.source.capture_next() {
            Ok(raw) => {
                if attempt > 0 {
                    tracing::info!(after_attempts = attempt, "Capture recovered");
                    attempt = 0;
                    ctx.state_tx.send_replace(BroadcasterState::Running);
                }

                match ctx.encoder.encode(&raw) {
                    Ok(data) => {
                        sequence += 1;
                        ctx.frames_tx.send_replace(Publication::Live(Frame {
                            sequence,
                            captured_at: SystemTime::now(),
                            data,
                            content_type,
                        }));
                        ctx.frames_published.fetch_add(1, Ordering::Relaxed);
                        last_publish = Some(Instant::now());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping frame: encode failed");
                    }
                }
            }
            Err(CaptureError::DeviceUnavailable(msg)) => {
                attempt += 1;
                if attempt > ctx.config.retry.budget {
                    tracing::error!(
                        attempts = attempt,
                        error = %msg,
                        "Retry budget exhausted, capture failed"
                    );
                    ctx.state_tx.send_replace(BroadcasterState::Failed);
                    ctx.frames_tx
                        .send_replace(Publication::Ended(EndReason::SourceUnavailable));
                    return;
                }

                let backoff = ctx.config.retry.backoff_for(attempt);
                tracing::warn!(
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %msg,
                    "Capture failed, retrying"
                );
                ctx.state_tx
                    .send_replace(BroadcasterState::Degraded { attempt });
                std::thread::sleep(backoff);
            }
            Err(CaptureError::ConfigRejected(msg)) => {
                // Not a capture-path error; treat like a skipped frame.
                tracing::warn!(error = %msg, "Unexpected configuration error during capture");
            }
        }
    }
}
