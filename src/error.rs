//! Error types
//!
//! Delivery failures are local to a subscription and never surface here.
//! The only errors a caller sees are a shut-down broker and transport I/O
//! failures from the stream writer.

use std::fmt;
use std::io;

/// Error type for broker and stream-writer operations
#[derive(Debug)]
pub enum Error {
    /// The broker has been shut down and no longer accepts requests
    Closed,
    /// Writing to the client transport failed
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Closed => write!(f, "Broker is closed"),
            Error::Io(e) => write!(f, "Stream I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Closed => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
