//! Alert distribution errors

use thiserror::Error;
use tokenguard_core::SinkError;

use crate::connection::{ConnectionId, ConnectionState};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Connection {id} is {state}")]
    InvalidState { id: ConnectionId, state: ConnectionState },

    #[error("Failed to persist alert: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AlertResult<T> = Result<T, AlertError>;

/// Delivery failure for one connection; never affects other connections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection {0} is closed")]
    Closed(ConnectionId),

    #[error("Serialization failed: {0}")]
    Encode(String),

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Client command that could not be understood
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed command: {0}")]
    Malformed(String),

    #[error("Unexpected command {0} in this state")]
    Unexpected(String),
}
