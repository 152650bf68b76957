//! Session registry
//!
//! Bookkeeping for live viewer sessions. The registry is not a queue and is
//! never on the frame hot path: frames reach sessions through the
//! broadcaster's watch channel. The registry exists for accounting (who is
//! connected, what have they been sent) and for clean teardown
//! (`close_all` during server shutdown).

pub mod entry;

pub use entry::SessionEntry;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Tracks live sessions
///
/// Thread-safe via `RwLock`. Iteration hands out a snapshot of `Arc`s, so a
/// session deregistering mid-iteration can never corrupt a visitor or cause
/// a double visit.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session for its lifetime
    pub async fn register(&self, entry: Arc<SessionEntry>) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len() + 1;
        sessions.insert(entry.id, Arc::clone(&entry));

        tracing::info!(
            session_id = entry.id,
            peer = %entry.peer_addr,
            sessions = count,
            "Session registered"
        );
    }

    /// Remove a session
    ///
    /// Idempotent; deregistering an unknown ID is a no-op.
    pub async fn deregister(&self, id: u64) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_some() {
            tracing::info!(session_id = id, sessions = sessions.len(), "Session deregistered");
        }
    }

    /// Stable snapshot of the currently active sessions
    pub async fn snapshot(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of active sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are active
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ask every active session to close
    ///
    /// Sessions deregister themselves as their write loops exit.
    pub async fn close_all(&self) {
        let snapshot = self.snapshot().await;
        tracing::info!(sessions = snapshot.len(), "Closing all sessions");
        for entry in snapshot {
            entry.request_close();
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
