//! Error types
//!
//! Every failure the relay can observe is local to one channel, one pipeline
//! or one listener. None of them are fatal to the host process; the channel
//! and supervisor convert them into log events.

use std::fmt;
use std::io;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Upstream pipeline could not be started
    Spawn(SpawnError),
    /// A consumer rejected a chunk
    Delivery(DeliveryError),
    /// A listen request could not be served
    Gateway(GatewayError),
    /// Underlying I/O error
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spawn(e) => write!(f, "Spawn error: {}", e),
            Error::Delivery(e) => write!(f, "Delivery error: {}", e),
            Error::Gateway(e) => write!(f, "Gateway error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn(e) => Some(e),
            Error::Delivery(e) => Some(e),
            Error::Gateway(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<SpawnError> for Error {
    fn from(e: SpawnError) -> Self {
        Error::Spawn(e)
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Error::Delivery(e)
    }
}

impl From<GatewayError> for Error {
    fn from(e: GatewayError) -> Self {
        Error::Gateway(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Failure to start an upstream pipeline
#[derive(Debug)]
pub enum SpawnError {
    /// The capture tool could not be started
    Capture { program: String, source: io::Error },
    /// The transcoder could not be started
    Transcoder { program: String, source: io::Error },
    /// A pipe between the stages was not available
    Pipe(&'static str),
    /// Spawner refused to start (used by non-process spawners)
    Rejected(String),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Capture { program, source } => {
                write!(f, "failed to start capture tool {}: {}", program, source)
            }
            SpawnError::Transcoder { program, source } => {
                write!(f, "failed to start transcoder {}: {}", program, source)
            }
            SpawnError::Pipe(which) => write!(f, "{} pipe unavailable", which),
            SpawnError::Rejected(reason) => write!(f, "spawn rejected: {}", reason),
        }
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpawnError::Capture { source, .. } | SpawnError::Transcoder { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// A consumer's sink rejected a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Sink buffer full, the chunk was dropped for this consumer
    Lagged,
    /// Downstream side has gone away
    Closed,
    /// Sink-specific failure
    Other(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Lagged => write!(f, "consumer lagging, chunk dropped"),
            DeliveryError::Closed => write!(f, "consumer closed"),
            DeliveryError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Failure to turn a listen request into a subscription
#[derive(Debug)]
pub enum GatewayError {
    /// Port was missing, non-numeric or zero
    InvalidPort(String),
    /// Host name lookup failed
    Resolve { host: String, source: io::Error },
    /// Lookup succeeded but returned no usable address
    NoAddress(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidPort(port) => write!(f, "Invalid port: {:?}", port),
            GatewayError::Resolve { host, source } => {
                write!(f, "Failed to resolve {}: {}", host, source)
            }
            GatewayError::NoAddress(host) => write!(f, "No address found for {}", host),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Resolve { source, .. } => Some(source),
            _ => None,
        }
    }
}
