//! TokenGuard Alert Distribution
//!
//! Turns severe decisions into alerts and streams them to live
//! subscribers scoped by account identity:
//!
//! - [`factory::AlertFactory`] - Decision → Alert when over the alerting threshold
//! - [`hub::AlertHub`] - connection registry, heartbeat liveness, bounded history, fan-out
//! - [`protocol`] - JSON client commands and server frames
//! - [`transport::AlertTransport`] - per-connection delivery seam

pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod hub;
pub mod protocol;
pub mod transport;

pub use buffer::AlertBuffer;
pub use config::{AlertPolicy, HubConfig};
pub use connection::{
    CloseReason, ConnectionEvent, ConnectionHandle, ConnectionId, ConnectionInfo, ConnectionState,
};
pub use error::{AlertError, AlertResult, ProtocolError, TransportError};
pub use factory::AlertFactory;
pub use hub::{AlertHub, HubStats};
pub use protocol::{ClientCommand, ServerMessage};
pub use transport::{AlertTransport, MemoryTransport};
