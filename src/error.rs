//! Crate-wide error type
//!
//! Component-local errors (`CaptureError`, `EncodeError`, `ControlError`)
//! live next to their components and are handled there; this type covers
//! the server and subscription surface.

/// Result alias using the crate error type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for server and broadcaster operations
#[derive(Debug)]
pub enum Error {
    /// I/O error from the network transport or listener
    Io(std::io::Error),
    /// The broadcaster is in a terminal state and cannot serve frames
    SourceUnavailable,
    /// The broadcaster has been shut down
    Shutdown,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::SourceUnavailable => write!(f, "Frame source unavailable"),
            Error::Shutdown => write!(f, "Broadcaster shut down"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
