//! Per-session registry entry

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::watch;

/// Bookkeeping record for one live session
///
/// Shared between the registry and the session's write task. Counters are
/// atomics so the session updates them without locking; the close flag lets
/// the registry ask the session to wind down.
pub struct SessionEntry {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the viewer connected
    pub connected_at: Instant,

    /// Highest frame sequence number delivered to this viewer
    pub last_sequence: AtomicU64,

    /// Frames written to the transport
    pub frames_delivered: AtomicU64,

    /// Frames skipped because the viewer could not keep up
    pub frames_skipped: AtomicU64,

    /// Payload bytes written to the transport
    pub bytes_sent: AtomicU64,

    close_tx: watch::Sender<bool>,
    close_rx: watch::Receiver<bool>,
}

impl SessionEntry {
    /// Create an entry for a newly attached viewer
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        let (close_tx, close_rx) = watch::channel(false);
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            last_sequence: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            close_tx,
            close_rx,
        }
    }

    /// Ask the session to close
    pub fn request_close(&self) {
        let _ = self.close_tx.send(true);
    }

    /// Whether a close has been requested
    pub fn close_requested(&self) -> bool {
        *self.close_rx.borrow()
    }

    /// Receiver the session selects on for close requests
    pub fn close_signal(&self) -> watch::Receiver<bool> {
        self.close_rx.clone()
    }

    /// Record a delivered frame
    pub fn record_delivery(&self, sequence: u64, bytes: usize) {
        self.last_sequence.store(sequence, Ordering::Relaxed);
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record frames the viewer could not keep up with
    pub fn record_skipped(&self, count: u64) {
        if count > 0 {
            self.frames_skipped.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Session duration so far
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
