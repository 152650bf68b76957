//! Per-viewer write loop
//!
//! A session reads the current-frame slot and writes one multipart part per
//! new frame, entirely on its own task. Delivery is monotonic per session:
//! the sequence guard never re-sends an already-delivered sequence number,
//! and the watch channel only ever moves forward, so delivered sequences
//! strictly increase.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::broadcast::{EndReason, Frame, FrameReceiver, Publication};
use crate::registry::{SessionEntry, SessionRegistry};

use super::multipart;
use super::SessionStats;

/// Why a session's write loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The broadcast ended (shutdown or source failure)
    Ended(EndReason),
    /// The registry asked the session to close
    CloseRequested,
    /// The broadcaster handle was dropped
    BroadcasterGone,
    /// The transport failed (viewer disconnected or write error)
    TransportError,
}

/// One viewer's streaming session
///
/// Owns the transport for its lifetime; deregisters itself and releases the
/// transport on every exit path.
pub struct StreamSession<W> {
    transport: W,
    frames: FrameReceiver,
    entry: Arc<SessionEntry>,
    registry: Arc<SessionRegistry>,
}

impl<W: AsyncWrite + Unpin + Send> StreamSession<W> {
    /// Attach a viewer transport to the broadcast
    pub fn attach(
        transport: W,
        frames: FrameReceiver,
        entry: Arc<SessionEntry>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            transport,
            frames,
            entry,
            registry,
        }
    }

    /// Run the write loop until the viewer disconnects or the broadcast ends
    ///
    /// Always deregisters the session and shuts the transport down before
    /// returning.
    pub async fn run(mut self) -> (CloseReason, SessionStats) {
        let reason = match self.stream().await {
            Ok(reason) => reason,
            Err(e) => {
                tracing::debug!(
                    session_id = self.entry.id,
                    error = %e,
                    "Session transport error"
                );
                CloseReason::TransportError
            }
        };

        let stats = SessionStats::from_entry(&self.entry);
        tracing::info!(
            session_id = self.entry.id,
            reason = ?reason,
            frames_delivered = stats.frames_delivered,
            frames_skipped = stats.frames_skipped,
            bytes_sent = stats.bytes_sent,
            "Session closed"
        );

        self.registry.deregister(self.entry.id).await;
        let _ = self.transport.shutdown().await;

        (reason, stats)
    }

    async fn stream(&mut self) -> std::io::Result<CloseReason> {
        let mut close = self.entry.close_signal();

        // Writes race against the close signal: a viewer that has stopped
        // draining its socket must not pin the session past a close request.
        let response_head = multipart::response_head();
        tokio::select! {
            written = self
                .transport
                .write_all(response_head.as_bytes()) => written?,
            _ = close.changed() => return Ok(CloseReason::CloseRequested),
        }

        loop {
            if self.entry.close_requested() {
                return Ok(CloseReason::CloseRequested);
            }

            // Observe the slot at our own pace; whatever was replaced while
            // we were writing is skipped, never queued.
            let publication = self.frames.borrow_and_update().clone();
            match publication {
                Publication::Live(frame) => {
                    let last = self.entry.last_sequence.load(Ordering::Relaxed);
                    if frame.sequence > last {
                        if last > 0 {
                            self.entry.record_skipped(frame.sequence - last - 1);
                        }
                        tokio::select! {
                            written = self.write_part(&frame) => {
                                written?;
                                self.entry.record_delivery(frame.sequence, frame.data.len());
                            }
                            _ = close.changed() => return Ok(CloseReason::CloseRequested),
                        }
                    }
                }
                Publication::Ended(reason) => return Ok(CloseReason::Ended(reason)),
                Publication::Pending => {}
            }

            tokio::select! {
                changed = self.frames.changed() => {
                    if changed.is_err() {
                        return Ok(CloseReason::BroadcasterGone);
                    }
                }
                _ = close.changed() => {}
            }
        }
    }

    async fn write_part(&mut self, frame: &Frame) -> std::io::Result<()> {
        let head = multipart::part_head(frame.content_type, frame.data.len());
        self.transport.write_all(head.as_bytes()).await?;
        self.transport.write_all(&frame.data).await?;
        self.transport.write_all(multipart::PART_TRAILER).await?;
        self.transport.flush().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use bytes::Bytes;
    use tokio::io::AsyncReadExt;
    use tokio::sync::watch;

    use super::*;

    fn frame(sequence: u64) -> Frame {
        Frame {
            sequence,
            captured_at: SystemTime::now(),
            data: Bytes::copy_from_slice(&sequence.to_be_bytes()),
            content_type: "image/jpeg",
        }
    }

    fn session_parts(
        buffer_size: usize,
    ) -> (
        watch::Sender<Publication>,
        StreamSession<tokio::io::DuplexStream>,
        tokio::io::DuplexStream,
        Arc<SessionEntry>,
        Arc<SessionRegistry>,
    ) {
        let (tx, rx) = watch::channel(Publication::Pending);
        let (server_io, client_io) = tokio::io::duplex(buffer_size);
        let entry = Arc::new(SessionEntry::new(1, "127.0.0.1:5000".parse().unwrap()));
        let registry = Arc::new(SessionRegistry::new());
        let session = StreamSession::attach(server_io, rx, Arc::clone(&entry), Arc::clone(&registry));
        (tx, session, client_io, entry, registry)
    }

    /// Extract the 8-byte payloads of every complete part in the stream.
    fn delivered_sequences(raw: &[u8]) -> Vec<u64> {
        let needle = b"\r\n\r\n";
        let mut sequences = Vec::new();
        let mut at = 0;
        // Skip the response head.
        if let Some(pos) = raw.windows(needle.len()).position(|w| w == needle) {
            at = pos + needle.len();
        }
        while at < raw.len() {
            match raw[at..].windows(needle.len()).position(|w| w == needle) {
                Some(pos) if at + pos + needle.len() + 8 <= raw.len() => {
                    let start = at + pos + needle.len();
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&raw[start..start + 8]);
                    sequences.push(u64::from_be_bytes(bytes));
                    at = start + 8;
                }
                _ => break,
            }
        }
        sequences
    }

    #[tokio::test]
    async fn test_delivery_is_monotonic() {
        let (tx, session, mut client_io, entry, registry) = session_parts(64 * 1024);
        registry.register(Arc::clone(&entry)).await;

        let handle = tokio::spawn(session.run());

        for seq in 1..=5 {
            tx.send_replace(Publication::Live(frame(seq)));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Give the session time to observe the final frame before ending.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(Publication::Ended(EndReason::Shutdown));

        let (reason, stats) = handle.await.unwrap();
        assert_eq!(reason, CloseReason::Ended(EndReason::Shutdown));

        let mut raw = Vec::new();
        client_io.read_to_end(&mut raw).await.unwrap();
        let sequences = delivered_sequences(&raw);

        assert!(!sequences.is_empty());
        assert!(sequences.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(*sequences.last().unwrap(), 5);
        assert_eq!(stats.frames_delivered, sequences.len() as u64);

        // Clean teardown leaves no registry entry behind.
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_slow_consumer_never_blocks_publisher() {
        // Small transport buffer and a reader that drains it slowly: the
        // session spends most of its time stalled on writes.
        let (tx, session, client_io, _entry, _registry) = session_parts(256);
        let handle = tokio::spawn(session.run());

        let reader = tokio::spawn(async move {
            let mut client_io = client_io;
            let mut raw = Vec::new();
            let mut chunk = [0u8; 64];
            loop {
                match client_io.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => raw.extend_from_slice(&chunk[..n]),
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            raw
        });

        // Publishing is a plain slot replacement; it can never block on the
        // stalled session.
        for seq in 1..=200 {
            tx.send_replace(Publication::Live(frame(seq)));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(Publication::Live(frame(500)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(Publication::Ended(EndReason::Shutdown));

        let (_reason, stats) = handle.await.unwrap();
        let raw = reader.await.unwrap();
        let sequences = delivered_sequences(&raw);

        // The stalled viewer skipped ahead instead of queueing a backlog.
        assert!(!sequences.is_empty());
        assert!(sequences.windows(2).all(|w| w[1] > w[0]));
        assert!(stats.frames_delivered < 200);
        assert!(stats.frames_skipped > 0);
    }

    #[tokio::test]
    async fn test_close_request_ends_session_promptly() {
        let (tx, session, _client_io, entry, registry) = session_parts(64 * 1024);
        registry.register(Arc::clone(&entry)).await;

        let handle = tokio::spawn(session.run());
        tx.send_replace(Publication::Live(frame(1)));
        tokio::time::sleep(Duration::from_millis(5)).await;

        entry.request_close();
        let (reason, _stats) = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("session did not close promptly")
            .unwrap();

        assert_eq!(reason, CloseReason::CloseRequested);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_close_request_interrupts_stalled_write() {
        // Tiny transport buffer and no reader at all: the session stalls
        // inside a write. A close request must still end it promptly.
        let (tx, session, _client_io, entry, registry) = session_parts(64);
        registry.register(Arc::clone(&entry)).await;

        let handle = tokio::spawn(session.run());

        tx.send_replace(Publication::Live(Frame {
            sequence: 1,
            captured_at: SystemTime::now(),
            data: Bytes::from(vec![0u8; 64 * 1024]),
            content_type: "image/jpeg",
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;

        entry.request_close();
        let (reason, _stats) = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("stalled session ignored close request")
            .unwrap();

        assert_eq!(reason, CloseReason::CloseRequested);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_transport_error_tears_down_one_session_only() {
        let (tx, session, client_io, entry, registry) = session_parts(1024);
        registry.register(Arc::clone(&entry)).await;

        let handle = tokio::spawn(session.run());

        // Peer disconnects.
        drop(client_io);

        // Keep publishing until the session notices the dead transport.
        let publisher = tokio::spawn(async move {
            for seq in 1..=100 {
                tx.send_replace(Publication::Live(frame(seq)));
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            tx
        });

        let (reason, _stats) = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("session did not notice dead transport")
            .unwrap();

        assert_eq!(reason, CloseReason::TransportError);
        assert!(registry.is_empty().await);

        // Publisher is unaffected by the failed session.
        let tx = publisher.await.unwrap();
        tx.send_replace(Publication::Live(frame(101)));
    }

    #[tokio::test]
    async fn test_three_viewers_receive_monotonic_subsequences() {
        let (tx, rx) = watch::channel(Publication::Pending);
        let registry = Arc::new(SessionRegistry::new());

        let mut handles = Vec::new();
        let mut clients = Vec::new();
        for id in 1..=3u64 {
            let (server_io, client_io) = tokio::io::duplex(256 * 1024);
            let entry = Arc::new(SessionEntry::new(id, "127.0.0.1:5000".parse().unwrap()));
            registry.register(Arc::clone(&entry)).await;
            let session = StreamSession::attach(server_io, rx.clone(), entry, Arc::clone(&registry));
            handles.push(tokio::spawn(session.run()));

            // Viewer 3 reads with an artificial delay.
            let delay = Duration::from_millis(if id == 3 { 3 } else { 0 });
            clients.push(tokio::spawn(async move {
                let mut client_io = client_io;
                let mut raw = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match client_io.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => raw.extend_from_slice(&chunk[..n]),
                    }
                    tokio::time::sleep(delay).await;
                }
                raw
            }));
        }

        for seq in 1..=100 {
            tx.send_replace(Publication::Live(frame(seq)));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // Hold the last frame briefly so every viewer can observe it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(Publication::Ended(EndReason::Shutdown));

        for handle in handles {
            let (reason, _stats) = handle.await.unwrap();
            assert_eq!(reason, CloseReason::Ended(EndReason::Shutdown));
        }

        for client in clients {
            let raw = client.await.unwrap();
            let sequences = delivered_sequences(&raw);

            assert!(!sequences.is_empty());
            assert!(sequences.windows(2).all(|w| w[1] > w[0]));
            assert!(sequences.iter().all(|s| (1..=100).contains(s)));
            assert_eq!(*sequences.last().unwrap(), 100);
        }

        assert!(registry.is_empty().await);
    }
}
