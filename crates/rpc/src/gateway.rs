//! WebSocket gateway
//!
//! ```text
//! client ──SUBSCRIBE──► handshake ──► AlertHub::connect ──► AlertHub::activate ──► OPEN
//!        ◄─SUBSCRIBED──
//!        ──HEARTBEAT / FILTER / REQUEST_CACHE──► AlertHub::handle_command
//!        ◄─ALERT──────── WsTransport::deliver ◄── hub delivery task
//! ```
//!
//! Each socket is split: the read half stays in the connection task, the
//! write half is owned by a writer task fed through an unbounded channel.
//! The hub, the gateway and the transport all write through that channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokenguard_alerts::{
    AlertHub, AlertTransport, ClientCommand, CloseReason, ConnectionHandle, ConnectionId, ServerMessage,
    TransportError,
};
use tokenguard_core::Alert;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{RpcError, RpcResult};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Outbox = mpsc::UnboundedSender<Message>;

/// [`AlertTransport`] that frames alerts as JSON text messages
#[derive(Default)]
pub struct WsTransport {
    writers: DashMap<ConnectionId, Outbox>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId, outbox: Outbox) {
        self.writers.insert(id, outbox);
    }

    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.writers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

#[async_trait]
impl AlertTransport for WsTransport {
    async fn deliver(&self, handle: &ConnectionHandle, alert: &Alert) -> Result<(), TransportError> {
        let json = ServerMessage::Alert { alert: alert.clone() }
            .to_json()
            .map_err(|e| TransportError::Encode(e.to_string()))?;

        let outbox = self
            .writers
            .get(&handle.id)
            .ok_or(TransportError::Closed(handle.id))?;
        outbox
            .send(Message::Text(json))
            .map_err(|_| TransportError::Closed(handle.id))
    }

    fn closed(&self, handle: &ConnectionHandle, reason: CloseReason) {
        if let Some((_, outbox)) = self.writers.remove(&handle.id) {
            debug!(connection_id = %handle.id, %reason, "Closing socket");
            let _ = outbox.send(Message::Close(None));
        }
    }
}

enum Handshake {
    Subscribe {
        subject_id: String,
        jurisdiction: Option<String>,
    },
    Rejected(String),
    Gone,
}

pub struct Gateway {
    hub: Arc<AlertHub>,
    transport: Arc<WsTransport>,
    handshake_timeout: Duration,
}

impl Gateway {
    pub fn new(hub: Arc<AlertHub>, transport: Arc<WsTransport>) -> Self {
        Self {
            hub,
            transport,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Accept connections until `shutdown` flips to `true`
    pub async fn serve(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> RpcResult<()> {
        info!(addr = %listener.local_addr()?, "Alert gateway listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let gateway = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = gateway.handle_connection(stream, addr).await {
                                debug!(%addr, error = %e, "Connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Alert gateway stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> RpcResult<()> {
        let ws = accept_async(stream).await?;
        let (mut sink, mut stream) = ws.split();
        debug!(%addr, "Socket accepted; awaiting SUBSCRIBE");

        let handshake = tokio::time::timeout(self.handshake_timeout, read_handshake(&mut stream))
            .await
            .unwrap_or_else(|_| Handshake::Rejected("handshake timed out".to_string()));

        let (subject_id, jurisdiction) = match handshake {
            Handshake::Subscribe {
                subject_id,
                jurisdiction,
            } => (subject_id, jurisdiction),
            Handshake::Rejected(message) => {
                warn!(%addr, reason = %message, "Handshake rejected");
                let json = ServerMessage::Error { message }.to_json()?;
                sink.send(Message::Text(json)).await?;
                sink.send(Message::Close(None)).await?;
                return Ok(());
            }
            Handshake::Gone => return Ok(()),
        };

        // Registered as CONNECTING so nothing is published before the writer exists
        let handle = self.hub.connect(subject_id, jurisdiction.clone());
        let (outbox, mut inbox) = mpsc::unbounded_channel::<Message>();
        self.transport.register(handle.id, outbox.clone());

        let writer = tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let opened = queue(
            &outbox,
            &ServerMessage::Subscribed {
                connection_id: handle.id,
                subject_id: handle.subject_id.clone(),
                jurisdiction,
            },
        )
        .and_then(|()| self.hub.activate(&handle).map_err(RpcError::from));

        let reason = match opened {
            Ok(()) => {
                info!(%addr, connection_id = %handle.id, subject_id = %handle.subject_id, "Subscriber connected");
                match self.read_loop(&handle, &mut stream, &outbox).await {
                    Ok(reason) => reason,
                    Err(e) => {
                        warn!(connection_id = %handle.id, error = %e, "Connection failed");
                        CloseReason::ProtocolError
                    }
                }
            }
            Err(e) => {
                warn!(connection_id = %handle.id, error = %e, "Subscriber not activated");
                CloseReason::Shutdown
            }
        };

        // No-op when the hub already closed it (stale, shutdown)
        self.hub.close(handle.id, reason);
        self.transport.unregister(handle.id);
        drop(outbox);
        let _ = writer.await;
        Ok(())
    }

    /// Serve client commands until the socket ends
    async fn read_loop(
        &self,
        handle: &ConnectionHandle,
        stream: &mut SplitStream<WebSocketStream<TcpStream>>,
        outbox: &Outbox,
    ) -> RpcResult<CloseReason> {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(reply) = self.hub.handle_command(handle, &text) {
                        queue(outbox, &reply)?;
                    }
                }
                Ok(Message::Ping(_)) => {
                    if let Err(e) = self.hub.heartbeat(handle) {
                        debug!(connection_id = %handle.id, error = %e, "Ping after close");
                    }
                }
                Ok(Message::Close(_)) => return Ok(CloseReason::ClientClosed),
                Ok(_) => {}
                Err(e) => {
                    warn!(connection_id = %handle.id, error = %e, "Read failed");
                    return Ok(CloseReason::ProtocolError);
                }
            }
        }
        Ok(CloseReason::ClientClosed)
    }
}

async fn read_handshake(stream: &mut SplitStream<WebSocketStream<TcpStream>>) -> Handshake {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                return match ClientCommand::parse(&text) {
                    Ok(ClientCommand::Subscribe {
                        subject_id,
                        jurisdiction,
                    }) => Handshake::Subscribe {
                        subject_id,
                        jurisdiction,
                    },
                    Ok(other) => Handshake::Rejected(format!("expected SUBSCRIBE, got {}", other.name())),
                    Err(e) => Handshake::Rejected(e.to_string()),
                };
            }
            Ok(Message::Close(_)) | Err(_) => return Handshake::Gone,
            Ok(_) => {}
        }
    }
    Handshake::Gone
}

fn queue(outbox: &Outbox, message: &ServerMessage) -> RpcResult<()> {
    let json = message.to_json()?;
    // A closed outbox means the writer already stopped; the read loop will see it
    let _ = outbox.send(Message::Text(json));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokenguard_core::{AlertType, Severity};

    fn handle(id: u64) -> ConnectionHandle {
        ConnectionHandle {
            id: ConnectionId(id),
            subject_id: "W1".to_string(),
            connected_at: Utc::now(),
        }
    }

    fn alert() -> Alert {
        Alert::new("W1", None, AlertType::TransferEscalated, Severity::Medium, "escalated", 45, "REQ-1")
    }

    #[tokio::test]
    async fn test_deliver_frames_alert_as_json() {
        let transport = WsTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register(ConnectionId(1), tx);

        transport.deliver(&handle(1), &alert()).await.unwrap();

        match rx.recv().await {
            Some(Message::Text(json)) => {
                assert!(json.contains("\"type\":\"ALERT\""));
                assert!(json.contains("REQ-1"));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_connection_fails() {
        let transport = WsTransport::new();
        let err = transport.deliver(&handle(9), &alert()).await.unwrap_err();
        assert_eq!(err, TransportError::Closed(ConnectionId(9)));
    }

    #[tokio::test]
    async fn test_closed_sends_close_frame_and_forgets_writer() {
        let transport = WsTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.register(ConnectionId(1), tx);

        transport.closed(&handle(1), CloseReason::Stale);

        assert!(transport.is_empty());
        assert!(matches!(rx.recv().await, Some(Message::Close(None))));
    }
}
