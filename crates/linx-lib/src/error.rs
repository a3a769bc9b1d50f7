//! Unified error type for the linx-lib crate.
//!
//! [`LinxError`] wraps the transport-level error and the domain-specific
//! error kinds (`Image`, `Transcode`, `Color`). `From` impls allow `?` to
//! propagate across module boundaries seamlessly.

use std::fmt;

use crate::transport::TransportError;

/// Unified error type for linx-lib operations.
#[derive(Debug)]
pub enum LinxError {
    /// USB transport error (enumeration, mode switch, bulk I/O).
    Transport(TransportError),
    /// Standard I/O error (stream file access, subprocess plumbing).
    Io(std::io::Error),
    /// Image encode/decode error.
    Image(String),
    /// ffmpeg invocation error.
    Transcode(String),
    /// Colour parsing error.
    Color(String),
}

impl fmt::Display for LinxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinxError::Transport(e) => write!(f, "{e}"),
            LinxError::Io(e) => write!(f, "I/O error: {e}"),
            LinxError::Image(e) => write!(f, "Image error: {e}"),
            LinxError::Transcode(e) => write!(f, "Transcode error: {e}"),
            LinxError::Color(e) => write!(f, "Color error: {e}"),
        }
    }
}

impl std::error::Error for LinxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinxError::Transport(e) => Some(e),
            LinxError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for LinxError {
    fn from(e: TransportError) -> Self {
        LinxError::Transport(e)
    }
}

impl From<std::io::Error> for LinxError {
    fn from(e: std::io::Error) -> Self {
        LinxError::Io(e)
    }
}

/// Crate-level Result alias using [`LinxError`].
pub type Result<T> = std::result::Result<T, LinxError>;
