//! Delivery seam between the hub and the wire
//!
//! The hub calls [`AlertTransport::deliver`] once per matching connection
//! per alert, from that connection's own delivery task. Framing belongs to
//! the transport.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokenguard_core::Alert;

use crate::connection::{CloseReason, ConnectionHandle, ConnectionId};
use crate::error::TransportError;

#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn deliver(&self, handle: &ConnectionHandle, alert: &Alert) -> Result<(), TransportError>;

    /// Called once when the hub closes a connection
    fn closed(&self, _handle: &ConnectionHandle, _reason: CloseReason) {}
}

/// Records deliveries per connection in arrival order
#[derive(Default)]
pub struct MemoryTransport {
    delivered: Mutex<HashMap<ConnectionId, Vec<Alert>>>,
    closed: Mutex<Vec<(ConnectionId, CloseReason)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered_to(&self, id: ConnectionId) -> Vec<Alert> {
        self.delivered.lock().get(&id).cloned().unwrap_or_default()
    }

    pub fn total_delivered(&self) -> usize {
        self.delivered.lock().values().map(Vec::len).sum()
    }

    pub fn closed_connections(&self) -> Vec<(ConnectionId, CloseReason)> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl AlertTransport for MemoryTransport {
    async fn deliver(&self, handle: &ConnectionHandle, alert: &Alert) -> Result<(), TransportError> {
        self.delivered
            .lock()
            .entry(handle.id)
            .or_default()
            .push(alert.clone());
        Ok(())
    }

    fn closed(&self, handle: &ConnectionHandle, reason: CloseReason) {
        self.closed.lock().push((handle.id, reason));
    }
}
