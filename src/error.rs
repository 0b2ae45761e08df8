//! Error types.
//!
//! `Error` covers everything that stops a run before or instead of a probe
//! session. `TransportError` describes why an established session ended; it
//! is reported alongside the statistics rather than propagated, since a
//! broken session still produces a summary.

use crate::config::ConfigError;
use std::io;
use std::time::Duration;

/// Run-level failures. Each one maps to a nonzero exit status.
#[derive(Debug)]
pub enum Error {
    /// Invalid option value or unreadable configuration file.
    Config(ConfigError),
    /// Name lookup failed or produced no usable address.
    Resolution { target: String, reason: String },
    /// Every candidate address refused or timed out.
    Connect {
        target: String,
        last: Option<io::Error>,
    },
    /// Local socket setup failed (bind, listen, runtime construction).
    Io(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{}", e),
            Error::Resolution { target, reason } => {
                write!(f, "Failed to resolve {}: {}", target, reason)
            }
            Error::Connect { target, last } => match last {
                Some(e) => write!(f, "Could not connect to any address of {}: {}", target, e),
                None => write!(f, "Could not connect to any address of {}", target),
            },
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Connect { last: Some(e), .. } => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Conditions that end an active probe session.
#[derive(Debug)]
pub enum TransportError {
    /// Writing the request failed.
    Send(io::Error),
    /// Reading or waiting for the reply failed.
    Receive(io::Error),
    /// The peer closed the connection.
    PeerClosed,
    /// No reply arrived within the deadline.
    Timeout(Duration),
    /// The peer sent more than a frame's worth of bytes without a delimiter.
    FrameTooLarge(usize),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Send(e) => write!(f, "Send failed: {}", e),
            TransportError::Receive(e) => write!(f, "Receive failed: {}", e),
            TransportError::PeerClosed => write!(f, "Connection closed by peer"),
            TransportError::Timeout(after) => {
                write!(f, "Timeout after {:.3} s", after.as_secs_f64())
            }
            TransportError::FrameTooLarge(n) => {
                write!(f, "Reply too large ({} bytes without delimiter)", n)
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Send(e) | TransportError::Receive(e) => Some(e),
            _ => None,
        }
    }
}
