//! Stream server listener
//!
//! Handles the TCP accept loop and spawns per-connection handlers. The
//! shutdown sequence is ordered: stop accepting, close live sessions, stop
//! the broadcaster (which releases the capture device last).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::broadcast::FrameBroadcaster;
use crate::config::CaptureConfig;
use crate::control::{ControlChannel, ControlError};
use crate::error::Result;
use crate::registry::{SessionEntry, SessionRegistry};
use crate::session::StreamSession;

use super::config::ServerConfig;
use super::http::{self, Request};

/// How long shutdown waits for sessions to wind down before stopping capture
const SESSION_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// MJPEG stream server
pub struct StreamServer {
    config: ServerConfig,
    broadcaster: Arc<FrameBroadcaster>,
    control: Arc<ControlChannel>,
    registry: Arc<SessionRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Create a server on top of a running broadcaster
    ///
    /// `capture_config` seeds the control surface and must match the
    /// configuration the broadcaster was spawned with.
    pub fn new(
        config: ServerConfig,
        broadcaster: Arc<FrameBroadcaster>,
        capture_config: CaptureConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            control: Arc::new(ControlChannel::new(
                Arc::clone(&broadcaster),
                capture_config,
            )),
            broadcaster,
            registry: Arc::new(SessionRegistry::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        &self.broadcaster
    }

    /// Get a reference to the control channel
    pub fn control(&self) -> &Arc<ControlChannel> {
        &self.control
    }

    /// Run the server until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections on a pre-bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Stream server listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Teardown order matters: stop accepting, close sessions, then stop
        // capture so the device is released after the last write.
        drop(listener);
        self.registry.close_all().await;

        let drained = tokio::time::timeout(SESSION_DRAIN_TIMEOUT, async {
            while !self.registry.is_empty().await {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            let sessions = self.registry.len().await;
            tracing::warn!(sessions, "Sessions still open at drain timeout");
        }

        self.broadcaster.shutdown();
        self.broadcaster.await_stopped().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, mut socket: TcpStream, peer_addr: SocketAddr) {
        let _permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    let max_request_bytes = self.config.max_request_bytes;
                    tokio::spawn(async move {
                        // Drain the request head so the 503 is not lost to a
                        // reset, then answer off the accept loop.
                        let _ = http::read_request(&mut socket, max_request_bytes).await;
                        let response = http::plain_response(
                            503,
                            "Service Unavailable",
                            "connection limit reached\n",
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let config = self.config.clone();
        let broadcaster = Arc::clone(&self.broadcaster);
        let control = Arc::clone(&self.control);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let _permit = _permit;

            if let Err(e) = serve_connection(
                socket,
                peer_addr,
                session_id,
                config,
                broadcaster,
                control,
                registry,
            )
            .await
            {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    peer_addr: SocketAddr,
    session_id: u64,
    config: ServerConfig,
    broadcaster: Arc<FrameBroadcaster>,
    control: Arc<ControlChannel>,
    registry: Arc<SessionRegistry>,
) -> Result<()> {
    let request = match http::read_request(&mut socket, config.max_request_bytes).await? {
        Some(request) => request,
        None => return Ok(()),
    };

    tracing::debug!(
        session_id = session_id,
        peer = %peer_addr,
        method = %request.method,
        path = %request.path,
        "Request"
    );

    if request.path == config.stream_path {
        return handle_stream(socket, peer_addr, session_id, request, broadcaster, registry).await;
    }

    let response = if request.path == config.control_path {
        handle_control(&request, &control).await
    } else if request.path == config.status_path {
        handle_status(&broadcaster, &registry).await
    } else {
        http::plain_response(404, "Not Found", "no such endpoint\n")
    };

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

async fn handle_stream(
    mut socket: TcpStream,
    peer_addr: SocketAddr,
    session_id: u64,
    request: Request,
    broadcaster: Arc<FrameBroadcaster>,
    registry: Arc<SessionRegistry>,
) -> Result<()> {
    if request.method != "GET" {
        let response = http::plain_response(405, "Method Not Allowed", "use GET\n");
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await?;
        return Ok(());
    }

    match broadcaster.subscribe() {
        Ok(frames) => {
            let entry = Arc::new(SessionEntry::new(session_id, peer_addr));
            registry.register(Arc::clone(&entry)).await;

            let session = StreamSession::attach(socket, frames, entry, registry);
            session.run().await;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(session_id = session_id, error = %e, "Stream attach rejected");
            let response =
                http::plain_response(503, "Service Unavailable", "stream source unavailable\n");
            socket.write_all(response.as_bytes()).await?;
            socket.shutdown().await?;
            Ok(())
        }
    }
}

async fn handle_control(request: &Request, control: &ControlChannel) -> String {
    if request.method != "GET" && request.method != "POST" {
        return http::plain_response(405, "Method Not Allowed", "use GET or POST\n");
    }

    let (name, value) = match (request.query_param("name"), request.query_param("value")) {
        (Some(name), Some(value)) => (name, value),
        _ => {
            return http::plain_response(400, "Bad Request", "name and value are required\n");
        }
    };

    match control.apply(name, value).await {
        Ok(()) => http::plain_response(200, "OK", "ok\n"),
        Err(ControlError::Rejected(msg)) => {
            http::plain_response(400, "Bad Request", &format!("{}\n", msg))
        }
        Err(ControlError::Unavailable) => {
            http::plain_response(503, "Service Unavailable", "capture source unavailable\n")
        }
    }
}

async fn handle_status(broadcaster: &FrameBroadcaster, registry: &SessionRegistry) -> String {
    let body = format!(
        "state: {}\nsessions: {}\nframes_published: {}\n",
        broadcaster.state(),
        registry.len().await,
        broadcaster.frames_published()
    );
    http::plain_response(200, "OK", &body)
}
