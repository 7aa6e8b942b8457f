//! Error types for devpulse core.

use std::{error::Error, fmt, io};

/// Error type for devpulse operations.
#[derive(Debug)]
pub enum PulseError {
    /// Required configuration is missing or invalid.
    Config(String),
    /// The request never produced a response (connection, TLS, timeout).
    Transport(String),
    /// The remote API answered with a non-success status.
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// A response body could not be decoded.
    Decode(String),
    /// Unified diff text could not be parsed.
    DiffParse(String),
    /// A requested remote entity does not exist.
    NotFound(String),
    /// An underlying I/O error.
    Io(io::Error),
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(message) => write!(f, "configuration error: {message}"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Api { status, body } => write!(f, "api error ({status}): {body}"),
            Self::Decode(message) => write!(f, "decode error: {message}"),
            Self::DiffParse(message) => write!(f, "diff parse error: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl Error for PulseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PulseError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PulseError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Convenience result type for devpulse core.
pub type Result<T> = std::result::Result<T, PulseError>;
