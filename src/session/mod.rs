//! Viewer sessions
//!
//! One `StreamSession` per connected viewer. A session owns its transport
//! and its own task: it observes the broadcaster's current-frame slot at
//! its own pace and writes multipart parts, so a slow viewer can never
//! stall capture or any other viewer.

pub mod multipart;
pub mod stream;

pub use stream::{CloseReason, StreamSession};

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::registry::SessionEntry;

/// Final accounting for one session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Frames written to the transport
    pub frames_delivered: u64,
    /// Frames the viewer could not keep up with
    pub frames_skipped: u64,
    /// Payload bytes written
    pub bytes_sent: u64,
    /// Session duration
    pub duration: Duration,
}

impl SessionStats {
    /// Snapshot the counters of a registry entry
    pub fn from_entry(entry: &SessionEntry) -> Self {
        Self {
            frames_delivered: entry.frames_delivered.load(Ordering::Relaxed),
            frames_skipped: entry.frames_skipped.load(Ordering::Relaxed),
            bytes_sent: entry.bytes_sent.load(Ordering::Relaxed),
            duration: entry.duration(),
        }
    }
}
