//! Subscriber connections and their lifecycle events

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Process-unique connection id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// `CONNECTING → OPEN → CLOSING → CLOSED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CloseReason {
    ClientClosed,
    ProtocolError,
    Stale,
    Shutdown,
}

/// What a subscriber holds; identifies its registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub subject_id: String,
    pub connected_at: DateTime<Utc>,
}

/// Snapshot of a registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub subject_id: String,
    pub jurisdiction_filter: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub state: ConnectionState,
}

/// Lifecycle events broadcast to monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectionEvent {
    Opened {
        handle: ConnectionHandle,
    },
    FilterChanged {
        connection_id: ConnectionId,
        jurisdiction: Option<String>,
    },
    /// Terminal; emitted exactly once per connection
    Closed {
        handle: ConnectionHandle,
        reason: CloseReason,
    },
}

impl ConnectionEvent {
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            ConnectionEvent::Opened { handle } | ConnectionEvent::Closed { handle, .. } => handle.id,
            ConnectionEvent::FilterChanged { connection_id, .. } => *connection_id,
        }
    }
}
