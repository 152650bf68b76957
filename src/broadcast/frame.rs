//! Published frame and broadcaster state types

use std::time::SystemTime;

use bytes::Bytes;

/// One encoded frame as published to sessions
///
/// Immutable once published; cheap to clone because the payload is
/// reference-counted. Sequence numbers are strictly increasing for the
/// lifetime of a broadcaster and never reused.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonically increasing publish sequence number (starts at 1)
    pub sequence: u64,
    /// Wall-clock capture time
    pub captured_at: SystemTime,
    /// Encoded image payload (zero-copy via reference counting)
    pub data: Bytes,
    /// MIME type of `data`
    pub content_type: &'static str,
}

/// Why a broadcast ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The capture device failed beyond the retry budget
    SourceUnavailable,
    /// The broadcaster was shut down
    Shutdown,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::SourceUnavailable => write!(f, "source unavailable"),
            EndReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The value held in the broadcaster's current-frame slot
///
/// Exactly one publication exists per broadcaster at any instant; the slot
/// is replaced atomically so readers never observe a partial update.
#[derive(Debug, Clone)]
pub enum Publication {
    /// No frame published yet
    Pending,
    /// The most recently published frame
    Live(Frame),
    /// The broadcast is over; no further frames will be published
    Ended(EndReason),
}

impl Publication {
    /// The contained frame, if live
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Publication::Live(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Broadcaster lifecycle state
///
/// `Stopped` (after shutdown) and `Failed` are terminal; recovery from
/// `Failed` requires spawning a new broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcasterState {
    /// Not running (terminal once shut down)
    Stopped,
    /// Acquiring the capture device
    Starting,
    /// Capturing and publishing
    Running,
    /// Transient capture errors, retrying with backoff
    Degraded {
        /// Consecutive failed capture attempts so far
        attempt: u32,
    },
    /// Retry budget exhausted (terminal)
    Failed,
}

impl BroadcasterState {
    /// Whether the broadcaster can still serve subscribers
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            BroadcasterState::Starting
                | BroadcasterState::Running
                | BroadcasterState::Degraded { .. }
        )
    }
}

impl std::fmt::Display for BroadcasterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcasterState::Stopped => write!(f, "stopped"),
            BroadcasterState::Starting => write!(f, "starting"),
            BroadcasterState::Running => write!(f, "running"),
            BroadcasterState::Degraded { attempt } => write!(f, "degraded (attempt {})", attempt),
            BroadcasterState::Failed => write!(f, "failed"),
        }
    }
}
