//! Live camera MJPEG fan-out streaming
//!
//! `camcast` turns one capture device into a live multipart image stream
//! for an arbitrary, changing set of network viewers. A single capture
//! loop pulls frames from a [`FrameSource`](source::FrameSource), encodes
//! them with a [`FrameEncoder`](encode::FrameEncoder), and publishes the
//! latest frame into a single atomically replaced slot; every viewer
//! session reads that slot at its own pace. Slow viewers drop frames, they
//! never buffer them, so capture latency is independent of the slowest
//! connection.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camcast::broadcast::{BroadcasterConfig, FrameBroadcaster};
//! use camcast::config::CaptureConfig;
//! use camcast::encode::JpegEncoder;
//! use camcast::server::{ServerConfig, StreamServer};
//! use camcast::source::SyntheticSource;
//!
//! #[tokio::main]
//! async fn main() -> camcast::Result<()> {
//!     let capture = CaptureConfig::default();
//!     let broadcaster = Arc::new(FrameBroadcaster::spawn(
//!         SyntheticSource::new(15),
//!         JpegEncoder::new(),
//!         capture.clone(),
//!         BroadcasterConfig::default().frame_rate_cap(15),
//!     ));
//!
//!     let server = StreamServer::new(ServerConfig::default(), broadcaster, capture);
//!     server.run().await
//! }
//! ```
//!
//! Point a browser (or `ffplay`) at `http://<host>:8080/stream` to view,
//! and adjust the sensor at runtime via
//! `http://<host>:8080/control?name=rotation&value=90`.

pub mod broadcast;
pub mod config;
pub mod control;
pub mod encode;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod source;

pub use broadcast::{BroadcasterConfig, FrameBroadcaster};
pub use config::CaptureConfig;
pub use error::{Error, Result};
pub use server::{ServerConfig, StreamServer};
