//! HTTP stream server
//!
//! Exposes the broadcaster over three fixed endpoints: the multipart frame
//! stream, the key/value control surface, and a plain-text status page.
//! Handles TCP accept + per-connection tasks; each streaming connection
//! becomes a `StreamSession`.

pub mod config;
pub mod http;
pub mod listener;

pub use config::ServerConfig;
pub use listener::StreamServer;
