//! Integration tests for alert fan-out, buffering and liveness

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use tokenguard_alerts::{
    AlertHub, AlertTransport, CloseReason, ConnectionEvent, ConnectionHandle, ConnectionId, ConnectionState,
    HubConfig, MemoryTransport, ServerMessage, TransportError,
};
use tokenguard_core::{Alert, AlertType, ComplianceRecord, MemorySink, Severity};

fn alert(subject: &str, jurisdiction: Option<&str>, n: usize) -> Alert {
    Alert::new(
        subject,
        jurisdiction.map(str::to_string),
        AlertType::TransferRejected,
        Severity::High,
        format!("alert {}", n),
        80,
        format!("REQ-{}", n),
    )
}

fn hub_with(config: HubConfig) -> (Arc<AlertHub>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let hub = AlertHub::new(config, transport.clone()).unwrap();
    (Arc::new(hub), transport)
}

/// Poll until `done` holds or a second passes
async fn eventually(done: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn test_wallet_isolation() {
    let (hub, transport) = hub_with(HubConfig::default());
    let w1 = hub.subscribe("W1", None);
    let w1_second = hub.subscribe("W1", None);
    let w2 = hub.subscribe("W2", None);

    assert_eq!(hub.publish(alert("W1", Some("US"), 1)).unwrap(), 2);

    assert!(eventually(|| transport.total_delivered() == 2).await);
    assert_eq!(transport.delivered_to(w1.id).len(), 1);
    assert_eq!(transport.delivered_to(w1_second.id).len(), 1);
    assert!(transport.delivered_to(w2.id).is_empty());
}

#[tokio::test]
async fn test_jurisdiction_filter_isolation() {
    let (hub, transport) = hub_with(HubConfig::default());
    let us_only = hub.subscribe("W1", Some("US".to_string()));
    let unfiltered = hub.subscribe("W1", None);

    hub.publish(alert("W1", Some("SG"), 1)).unwrap();
    hub.publish(alert("W1", Some("US"), 2)).unwrap();
    hub.publish(alert("W1", None, 3)).unwrap();

    assert!(eventually(|| transport.delivered_to(unfiltered.id).len() == 3).await);
    let us: Vec<String> = transport
        .delivered_to(us_only.id)
        .into_iter()
        .map(|a| a.request_id)
        .collect();
    assert_eq!(us, vec!["REQ-2"]);
}

#[tokio::test]
async fn test_fifo_per_connection() {
    let (hub, transport) = hub_with(HubConfig::default());
    let handle = hub.subscribe("W1", None);

    for n in 0..50 {
        hub.publish(alert("W1", None, n)).unwrap();
    }

    assert!(eventually(|| transport.delivered_to(handle.id).len() == 50).await);
    let order: Vec<String> = transport
        .delivered_to(handle.id)
        .into_iter()
        .map(|a| a.request_id)
        .collect();
    let expected: Vec<String> = (0..50).map(|n| format!("REQ-{}", n)).collect();
    assert_eq!(order, expected);
}

/// Fails every delivery to one connection, stalls none
struct FlakyTransport {
    broken: ConnectionId,
    inner: MemoryTransport,
    failures: AtomicUsize,
}

#[async_trait]
impl AlertTransport for FlakyTransport {
    async fn deliver(&self, handle: &ConnectionHandle, alert: &Alert) -> Result<(), TransportError> {
        if handle.id == self.broken {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::Io("connection reset".to_string()));
        }
        self.inner.deliver(handle, alert).await
    }
}

#[tokio::test]
async fn test_failing_connection_is_isolated() {
    let transport = Arc::new(FlakyTransport {
        // Ids are allocated from 1 in subscription order
        broken: ConnectionId(1),
        inner: MemoryTransport::new(),
        failures: AtomicUsize::new(0),
    });
    let hub = AlertHub::new(HubConfig::default(), transport.clone()).unwrap();
    let broken = hub.subscribe("W1", None);
    let healthy = hub.subscribe("W1", None);
    assert_eq!(broken.id, ConnectionId(1));

    for n in 0..3 {
        hub.publish(alert("W1", None, n)).unwrap();
    }

    assert!(eventually(|| transport.inner.delivered_to(healthy.id).len() == 3).await);
    assert!(eventually(|| transport.failures.load(Ordering::SeqCst) == 3).await);
    assert!(eventually(|| hub.stats().failed == 3).await);
    // Still registered; delivery failures do not close the connection
    assert!(hub.connection(broken.id).is_some());
}

/// Never completes a delivery
struct StuckTransport;

#[async_trait]
impl AlertTransport for StuckTransport {
    async fn deliver(&self, _: &ConnectionHandle, _: &Alert) -> Result<(), TransportError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_publish_never_waits_on_delivery() {
    let config = HubConfig {
        queue_capacity: 4,
        ..HubConfig::default()
    };
    let hub = AlertHub::new(config, Arc::new(StuckTransport)).unwrap();
    hub.subscribe("W1", None);

    let publishing = async {
        for n in 0..20 {
            hub.publish(alert("W1", None, n)).unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(1), publishing)
        .await
        .expect("publish blocked on a stuck transport");

    let stats = hub.stats();
    assert_eq!(stats.published, 20);
    assert!(stats.dropped > 0);
}

// =============================================================================
// Buffer
// =============================================================================

#[tokio::test]
async fn test_buffer_holds_at_most_capacity_and_evicts_first() {
    let (hub, _) = hub_with(HubConfig::default());

    for n in 0..1001 {
        hub.publish(alert("W1", None, n)).unwrap();
    }

    let buffered = hub.buffered_alerts("W1");
    assert_eq!(buffered.len(), 1000);
    assert_eq!(buffered[0].request_id, "REQ-1");
    assert!(buffered.iter().all(|a| a.request_id != "REQ-0"));
    assert_eq!(hub.stats().buffered_alerts, 1000);
}

#[tokio::test]
async fn test_buffer_is_shared_across_subjects() {
    let config = HubConfig {
        buffer_capacity: 3,
        ..HubConfig::default()
    };
    let (hub, _) = hub_with(config);

    hub.publish(alert("W1", None, 1)).unwrap();
    hub.publish(alert("W2", None, 2)).unwrap();
    hub.publish(alert("W2", None, 3)).unwrap();
    hub.publish(alert("W2", None, 4)).unwrap();

    assert!(hub.buffered_alerts("W1").is_empty());
    assert_eq!(hub.buffered_alerts("W2").len(), 3);
}

// =============================================================================
// Client protocol
// =============================================================================

#[tokio::test]
async fn test_protocol_commands() {
    let (hub, _) = hub_with(HubConfig {
        replay_limit: 2,
        ..HubConfig::default()
    });
    let handle = hub.subscribe("W1", None);
    for n in 0..3 {
        hub.publish(alert("W1", Some("US"), n)).unwrap();
    }

    assert!(matches!(
        hub.handle_command(&handle, r#"{"type":"HEARTBEAT"}"#),
        Some(ServerMessage::HeartbeatAck { .. })
    ));

    assert_eq!(
        hub.handle_command(&handle, r#"{"type":"FILTER","jurisdiction":"SG"}"#),
        Some(ServerMessage::FilterUpdated {
            jurisdiction: Some("SG".to_string())
        })
    );
    assert_eq!(
        hub.connection(handle.id).unwrap().jurisdiction_filter.as_deref(),
        Some("SG")
    );

    match hub.handle_command(&handle, r#"{"type":"REQUEST_CACHE"}"#) {
        Some(ServerMessage::CachedAlerts { alerts }) => {
            let ids: Vec<String> = alerts.into_iter().map(|a| a.request_id).collect();
            assert_eq!(ids, vec!["REQ-2", "REQ-1"]);
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_commands_are_ignored() {
    let (hub, _) = hub_with(HubConfig::default());
    let handle = hub.subscribe("W1", None);

    assert_eq!(hub.handle_command(&handle, "{{{"), None);
    assert_eq!(hub.handle_command(&handle, r#"{"type":"SHOUT"}"#), None);
    assert_eq!(
        hub.handle_command(&handle, r#"{"type":"SUBSCRIBE","subject_id":"W2"}"#),
        None
    );

    let info = hub.connection(handle.id).unwrap();
    assert_eq!(info.subject_id, "W1");
}

// =============================================================================
// Liveness
// =============================================================================

#[tokio::test]
async fn test_sweeper_closes_stale_connection_within_one_interval() {
    let (hub, _) = hub_with(HubConfig {
        stale_timeout_ms: 60,
        sweep_interval_ms: 20,
        ..HubConfig::default()
    });
    let mut events = hub.events();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = hub.spawn_sweeper(shutdown_rx);

    let handle = hub.subscribe("W1", None);

    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(ConnectionEvent::Closed { handle, reason }) = events.recv().await {
                return (handle, reason);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(closed.0.id, handle.id);
    assert_eq!(closed.1, CloseReason::Stale);
    assert!(hub.connection(handle.id).is_none());

    shutdown_tx.send(true).unwrap();
    sweeper.await.unwrap();
}

/// Looks back into the hub while it is being told about a close
#[derive(Default)]
struct ReentrantTransport {
    hub: OnceLock<Weak<AlertHub>>,
    observed: Mutex<Vec<(ConnectionState, bool)>>,
}

#[async_trait]
impl AlertTransport for ReentrantTransport {
    async fn deliver(&self, _: &ConnectionHandle, _: &Alert) -> Result<(), TransportError> {
        Ok(())
    }

    fn closed(&self, handle: &ConnectionHandle, _reason: CloseReason) {
        if let Some(hub) = self.hub.get().and_then(Weak::upgrade) {
            let state = hub.connection_state(handle.id);
            let closed_again = hub.close(handle.id, CloseReason::Stale);
            self.observed.lock().push((state, closed_again));
        }
    }
}

#[tokio::test]
async fn test_close_passes_through_closing_once() {
    let transport = Arc::new(ReentrantTransport::default());
    let hub = Arc::new(AlertHub::new(HubConfig::default(), transport.clone()).unwrap());
    let _ = transport.hub.set(Arc::downgrade(&hub));
    let mut events = hub.events();

    let handle = hub.subscribe("W1", None);
    let _ = events.recv().await;
    assert!(hub.close(handle.id, CloseReason::ProtocolError));

    assert_eq!(*transport.observed.lock(), vec![(ConnectionState::Closing, false)]);
    assert_eq!(hub.connection_state(handle.id), ConnectionState::Closed);
    assert_eq!(
        events.recv().await.unwrap(),
        ConnectionEvent::Closed {
            handle,
            reason: CloseReason::ProtocolError,
        }
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_published_alerts_are_persisted() {
    let sink = Arc::new(MemorySink::new());
    let hub = AlertHub::new(HubConfig::default(), Arc::new(MemoryTransport::new()))
        .unwrap()
        .with_sink(sink.clone());

    hub.publish(alert("W1", None, 1)).unwrap();

    match &sink.records()[..] {
        [ComplianceRecord::AlertPublished { alert, .. }] => assert_eq!(alert.request_id, "REQ-1"),
        other => panic!("unexpected records {:?}", other),
    }
}
