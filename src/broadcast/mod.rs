//! Frame broadcasting
//!
//! One capture loop fans the latest encoded frame out to every connected
//! session. There is no per-consumer queue: the broadcaster keeps exactly
//! one "current frame" slot (a `tokio::sync::watch` channel) and replaces
//! it atomically on every publish.
//!
//! # Architecture
//!
//! ```text
//!    [capture thread]                      Arc<FrameBroadcaster>
//!    FrameSource::capture_next()      ┌──────────────────────────────┐
//!           │                         │ frames: watch<Publication>   │
//!           ▼                         │ state:  watch<State>         │
//!    FrameEncoder::encode()           │ control mailbox (mpsc)       │
//!           │                         └──────────────┬───────────────┘
//!           ▼                                        │
//!    watch::Sender::send_replace ────────────────────┤
//!                                                    │
//!                        ┌───────────────────────────┼──────────────┐
//!                        ▼                           ▼              ▼
//!                  [StreamSession]            [StreamSession]      ...
//!                  frames.changed()           frames.changed()
//! ```
//!
//! # Backpressure
//!
//! Slow consumers drop frames, they never buffer them. A watch receiver
//! always observes the newest value; whatever a session could not send in
//! time is simply skipped for that session. Capture rate is therefore
//! independent of the slowest subscriber.

pub mod broadcaster;
pub mod config;
pub mod frame;

pub use broadcaster::{FrameBroadcaster, FrameReceiver};
pub use config::{BroadcasterConfig, RetryPolicy};
pub use frame::{BroadcasterState, EndReason, Frame, Publication};
