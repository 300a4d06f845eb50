//! Alert distribution hub
//!
//! ```text
//! publish(alert)
//!   │ lock: buffer.push + snapshot matching OPEN connections
//!   ▼
//! try_send ──► [bounded queue] ──► delivery task ──► AlertTransport::deliver
//!   (per connection, outside the lock; full queue ⇒ dropped + logged)
//! ```
//!
//! Liveness is cooperative: a single sweeper closes connections whose last
//! heartbeat is older than the stale timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokenguard_core::{Alert, ComplianceRecord, RecordSink};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::buffer::AlertBuffer;
use crate::config::HubConfig;
use crate::connection::{
    CloseReason, ConnectionEvent, ConnectionHandle, ConnectionId, ConnectionInfo, ConnectionState,
};
use crate::error::{AlertError, AlertResult, ProtocolError};
use crate::protocol::{ClientCommand, ServerMessage};
use crate::transport::AlertTransport;

struct ConnectionEntry {
    handle: ConnectionHandle,
    filter: Option<String>,
    state: ConnectionState,
    last_heartbeat: Instant,
    last_heartbeat_at: DateTime<Utc>,
    queue: mpsc::Sender<Alert>,
    task: JoinHandle<()>,
}

impl ConnectionEntry {
    fn matches(&self, alert: &Alert) -> bool {
        self.state == ConnectionState::Open
            && self.handle.subject_id == alert.subject_id
            && self
                .filter
                .as_deref()
                .map_or(true, |f| alert.jurisdiction.as_deref() == Some(f))
    }

    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.handle.id,
            subject_id: self.handle.subject_id.clone(),
            jurisdiction_filter: self.filter.clone(),
            connected_at: self.handle.connected_at,
            last_heartbeat: self.last_heartbeat_at,
            state: self.state,
        }
    }
}

struct HubState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    buffer: AlertBuffer,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time hub statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub open_connections: usize,
    pub buffered_alerts: usize,
    pub published: u64,
    pub delivered: u64,
    /// Not enqueued because the connection's queue was full
    pub dropped: u64,
    /// Transport reported an error
    pub failed: u64,
}

pub struct AlertHub {
    config: HubConfig,
    transport: Arc<dyn AlertTransport>,
    sink: Option<Arc<dyn RecordSink>>,
    state: Mutex<HubState>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl AlertHub {
    pub fn new(config: HubConfig, transport: Arc<dyn AlertTransport>) -> AlertResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            state: Mutex::new(HubState {
                connections: HashMap::new(),
                buffer: AlertBuffer::new(config.buffer_capacity),
            }),
            config,
            transport,
            sink: None,
            next_id: AtomicU64::new(1),
            counters: Arc::new(Counters::default()),
            events,
        })
    }

    /// Persist every published alert
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Monitoring feed of connection lifecycle events
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Register an authenticated subscriber and start its delivery task.
    ///
    /// Shorthand for [`connect`](Self::connect) followed by
    /// [`activate`](Self::activate). Must be called from within a Tokio runtime.
    pub fn subscribe(&self, subject_id: impl Into<String>, filter: Option<String>) -> ConnectionHandle {
        let handle = self.connect(subject_id, filter);
        if let Err(e) = self.activate(&handle) {
            warn!(connection_id = %handle.id, error = %e, "Connection closed before activation");
        }
        handle
    }

    /// Register a subscriber in the CONNECTING state.
    ///
    /// Its delivery task is running but publish skips it until
    /// [`activate`](Self::activate), so the transport side can be wired first.
    pub fn connect(&self, subject_id: impl Into<String>, filter: Option<String>) -> ConnectionHandle {
        let now = Utc::now();
        let handle = ConnectionHandle {
            id: ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            subject_id: subject_id.into(),
            connected_at: now,
        };

        let (queue, rx) = mpsc::channel(self.config.queue_capacity);
        let task = tokio::spawn(delivery_loop(
            handle.clone(),
            rx,
            Arc::clone(&self.transport),
            Arc::clone(&self.counters),
        ));

        let entry = ConnectionEntry {
            handle: handle.clone(),
            filter,
            state: ConnectionState::Connecting,
            last_heartbeat: Instant::now(),
            last_heartbeat_at: now,
            queue,
            task,
        };
        self.state.lock().connections.insert(handle.id, entry);

        debug!(connection_id = %handle.id, subject_id = %handle.subject_id, "Connection registered");
        handle
    }

    /// `CONNECTING → OPEN`; from here on the connection receives alerts
    pub fn activate(&self, handle: &ConnectionHandle) -> AlertResult<()> {
        let filter = {
            let mut state = self.state.lock();
            let entry = state
                .connections
                .get_mut(&handle.id)
                .ok_or(AlertError::UnknownConnection(handle.id))?;
            if entry.state != ConnectionState::Connecting {
                return Err(AlertError::InvalidState {
                    id: handle.id,
                    state: entry.state,
                });
            }
            entry.state = ConnectionState::Open;
            entry.filter.clone()
        };

        info!(
            connection_id = %handle.id,
            subject_id = %handle.subject_id,
            filter = ?filter,
            "Connection opened"
        );
        let _ = self.events.send(ConnectionEvent::Opened { handle: handle.clone() });
        Ok(())
    }

    /// Buffer the alert and enqueue it for every matching open connection.
    ///
    /// Never waits on delivery. Returns how many connections it was queued for.
    pub fn publish(&self, alert: Alert) -> AlertResult<usize> {
        let targets: Vec<(ConnectionId, mpsc::Sender<Alert>)> = {
            let mut state = self.state.lock();
            if let Some(evicted) = state.buffer.push(alert.clone()) {
                debug!(alert_id = %evicted.alert_id, "Evicted oldest buffered alert");
            }
            state
                .connections
                .values()
                .filter(|entry| entry.matches(&alert))
                .map(|entry| (entry.handle.id, entry.queue.clone()))
                .collect()
        };
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let mut queued = 0;
        for (id, queue) in targets {
            match queue.try_send(alert.clone()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(connection_id = %id, alert_id = %alert.alert_id, "Delivery queue full, alert dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %id, "Connection closed during publish");
                }
            }
        }

        info!(
            alert_id = %alert.alert_id,
            subject_id = %alert.subject_id,
            severity = %alert.severity,
            queued,
            "Alert published"
        );

        if let Some(sink) = &self.sink {
            sink.append(&ComplianceRecord::alert(&alert)).map_err(|e| {
                error!(alert_id = %alert.alert_id, error = %e, "Failed to persist alert");
                AlertError::Sink(e)
            })?;
        }

        Ok(queued)
    }

    pub fn heartbeat(&self, handle: &ConnectionHandle) -> AlertResult<DateTime<Utc>> {
        let mut state = self.state.lock();
        let entry = state
            .connections
            .get_mut(&handle.id)
            .ok_or(AlertError::UnknownConnection(handle.id))?;

        entry.last_heartbeat = Instant::now();
        entry.last_heartbeat_at = Utc::now();
        Ok(entry.last_heartbeat_at)
    }

    /// Set or clear the jurisdiction filter
    pub fn set_filter(&self, handle: &ConnectionHandle, jurisdiction: Option<String>) -> AlertResult<()> {
        {
            let mut state = self.state.lock();
            let entry = state
                .connections
                .get_mut(&handle.id)
                .ok_or(AlertError::UnknownConnection(handle.id))?;
            entry.filter = jurisdiction.clone();
        }

        debug!(connection_id = %handle.id, filter = ?jurisdiction, "Filter updated");
        let _ = self.events.send(ConnectionEvent::FilterChanged {
            connection_id: handle.id,
            jurisdiction,
        });
        Ok(())
    }

    /// Client-initiated close
    pub fn unsubscribe(&self, handle: &ConnectionHandle) -> bool {
        self.close(handle.id, CloseReason::ClientClosed)
    }

    /// Close a connection, releasing its entry and delivery task.
    ///
    /// The entry is CLOSING while the transport is told; a concurrent close
    /// of the same connection returns false. Returns false if it was
    /// already closing or closed.
    pub fn close(&self, id: ConnectionId, reason: CloseReason) -> bool {
        let handle = {
            let mut state = self.state.lock();
            match state.connections.get_mut(&id) {
                Some(entry) if entry.state != ConnectionState::Closing => {
                    entry.state = ConnectionState::Closing;
                    entry.handle.clone()
                }
                _ => return false,
            }
        };

        self.transport.closed(&handle, reason);

        if let Some(entry) = self.state.lock().connections.remove(&id) {
            entry.task.abort();
        }

        info!(
            connection_id = %id,
            subject_id = %handle.subject_id,
            reason = %reason,
            "Connection closed"
        );
        let _ = self.events.send(ConnectionEvent::Closed { handle, reason });
        true
    }

    /// Current state; CLOSED once the entry has been released
    pub fn connection_state(&self, id: ConnectionId) -> ConnectionState {
        self.state
            .lock()
            .connections
            .get(&id)
            .map_or(ConnectionState::Closed, |entry| entry.state)
    }

    /// Close every connection whose heartbeat is older than the stale timeout
    pub fn sweep_stale_at(&self, now: Instant) -> Vec<ConnectionId> {
        let stale_timeout = self.config.stale_timeout();
        let stale: Vec<ConnectionId> = self
            .state
            .lock()
            .connections
            .values()
            .filter(|entry| now.saturating_duration_since(entry.last_heartbeat) > stale_timeout)
            .map(|entry| entry.handle.id)
            .collect();

        for id in &stale {
            self.close(*id, CloseReason::Stale);
        }
        if !stale.is_empty() {
            warn!(closed = stale.len(), "Closed stale connections");
        }
        stale
    }

    /// Run the sweep every `sweep_interval` until `shutdown` flips to true
    pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let period = self.config.sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        hub.sweep_stale_at(Instant::now());
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Sweeper stopped");
        })
    }

    /// Close every connection
    pub fn shutdown(&self) -> usize {
        let ids: Vec<ConnectionId> = self.state.lock().connections.keys().copied().collect();
        let closed = ids
            .into_iter()
            .filter(|id| self.close(*id, CloseReason::Shutdown))
            .count();
        info!(closed, "Alert hub shut down");
        closed
    }

    /// Buffered alerts for a subject, oldest first
    pub fn buffered_alerts(&self, subject_id: &str) -> Vec<Alert> {
        self.state.lock().buffer.for_subject(subject_id)
    }

    /// Answer one client command. Unrecognized or malformed input is
    /// logged and ignored; the connection stays open.
    pub fn handle_command(&self, handle: &ConnectionHandle, text: &str) -> Option<ServerMessage> {
        let command = match ClientCommand::parse(text) {
            Ok(command) => command,
            Err(e) => {
                warn!(connection_id = %handle.id, error = %e, "Ignoring client command");
                return None;
            }
        };

        let reply = match command {
            ClientCommand::Heartbeat => self
                .heartbeat(handle)
                .map(|timestamp| ServerMessage::HeartbeatAck { timestamp }),
            ClientCommand::Filter { jurisdiction } => self
                .set_filter(handle, jurisdiction.clone())
                .map(|()| ServerMessage::FilterUpdated { jurisdiction }),
            ClientCommand::RequestCache => {
                let alerts = self
                    .state
                    .lock()
                    .buffer
                    .recent_for(&handle.subject_id, self.config.replay_limit);
                Ok(ServerMessage::CachedAlerts { alerts })
            }
            ClientCommand::Subscribe { .. } => {
                let e = ProtocolError::Unexpected("SUBSCRIBE".to_string());
                warn!(connection_id = %handle.id, error = %e, "Ignoring client command");
                return None;
            }
        };

        match reply {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(connection_id = %handle.id, error = %e, "Command on closed connection");
                None
            }
        }
    }

    pub fn connection(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.state.lock().connections.get(&id).map(ConnectionEntry::info)
    }

    pub fn connections_for(&self, subject_id: &str) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .state
            .lock()
            .connections
            .values()
            .filter(|entry| entry.handle.subject_id == subject_id)
            .map(ConnectionEntry::info)
            .collect();
        infos.sort_by_key(|info| info.connection_id);
        infos
    }

    pub fn stats(&self) -> HubStats {
        let state = self.state.lock();
        HubStats {
            open_connections: state
                .connections
                .values()
                .filter(|entry| entry.state == ConnectionState::Open)
                .count(),
            buffered_alerts: state.buffer.len(),
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn delivery_loop(
    handle: ConnectionHandle,
    mut rx: mpsc::Receiver<Alert>,
    transport: Arc<dyn AlertTransport>,
    counters: Arc<Counters>,
) {
    while let Some(alert) = rx.recv().await {
        match transport.deliver(&handle, &alert).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    connection_id = %handle.id,
                    alert_id = %alert.alert_id,
                    error = %e,
                    "Alert delivery failed"
                );
            }
        }
    }
    debug!(connection_id = %handle.id, "Delivery task finished");
}
