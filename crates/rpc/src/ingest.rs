//! Transaction event ingestion
//!
//! Where events come from (block polling, a webhook, a replay file) is the
//! source's business; the run loop only pulls and hands them on. Events for
//! unrelated subjects may arrive in any order.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokenguard_core::{ActionRequest, DecisionStatus, TransferRequest};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{RpcError, RpcResult};
use crate::pipeline::TransactionEventHandler;

/// A token transfer observed on-chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub tx_hash: String,
    pub token_id: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub jurisdiction: String,
    pub block_time: DateTime<Utc>,
}

impl TransactionEvent {
    /// Transfer request keyed by the transaction hash, so a re-delivered
    /// event replays its stored decision
    pub fn to_request(&self) -> ActionRequest {
        ActionRequest::transfer(TransferRequest {
            from: self.from.clone(),
            to: self.to.clone(),
            token_id: self.token_id.clone(),
            amount: self.amount,
            amount_usd: self.amount_usd,
            jurisdiction: self.jurisdiction.clone(),
            timestamp: self.block_time,
        })
        .with_request_id(self.tx_hash.clone())
    }
}

#[async_trait]
pub trait TransactionEventSource: Send {
    /// Next event, or `None` once the source is exhausted
    async fn next_event(&mut self) -> RpcResult<Option<TransactionEvent>>;
}

/// Push-style source fed through a tokio channel
pub struct ChannelEventSource {
    rx: mpsc::Receiver<TransactionEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: mpsc::Receiver<TransactionEvent>) -> Self {
        Self { rx }
    }

    /// Bounded channel plus the source reading from it
    pub fn channel(capacity: usize) -> (mpsc::Sender<TransactionEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TransactionEventSource for ChannelEventSource {
    async fn next_event(&mut self) -> RpcResult<Option<TransactionEvent>> {
        Ok(self.rx.recv().await)
    }
}

/// Replays a JSONL file, one event per line; blank lines are skipped
pub struct JsonlEventSource {
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl JsonlEventSource {
    pub async fn open(path: impl AsRef<Path>) -> RpcResult<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line: 0,
        })
    }
}

#[async_trait]
impl TransactionEventSource for JsonlEventSource {
    async fn next_event(&mut self) -> RpcResult<Option<TransactionEvent>> {
        while let Some(text) = self.lines.next_line().await? {
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&text).map_err(|e| RpcError::MalformedEvent {
                line: self.line,
                reason: e.to_string(),
            })?;
            return Ok(Some(event));
        }
        Ok(None)
    }
}

/// Counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub processed: usize,
    pub approved: usize,
    pub escalated: usize,
    pub rejected: usize,
    pub alerts: usize,
    /// Events the handler refused (validation, idempotency conflict)
    pub failed: usize,
}

/// Drain `source` into `handler` until the source is exhausted.
///
/// Per-event failures are logged and counted; infrastructure failures
/// (record sink, I/O, malformed input) stop the run.
pub async fn run<S, H>(source: &mut S, handler: &H) -> RpcResult<IngestStats>
where
    S: TransactionEventSource + ?Sized,
    H: TransactionEventHandler + ?Sized,
{
    let mut stats = IngestStats::default();

    while let Some(event) = source.next_event().await? {
        let tx_hash = event.tx_hash.clone();
        debug!(tx_hash = %tx_hash, "Transaction event received");

        match handler.on_transaction_event(event).await {
            Ok(outcome) => {
                stats.processed += 1;
                match outcome.decision.status {
                    DecisionStatus::Approved => stats.approved += 1,
                    DecisionStatus::Escalated => stats.escalated += 1,
                    DecisionStatus::Rejected => stats.rejected += 1,
                }
                if outcome.alert.is_some() {
                    stats.alerts += 1;
                }
            }
            Err(e) if e.is_fatal() => {
                error!(tx_hash = %tx_hash, error = %e, "Ingestion stopped");
                return Err(e);
            }
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "Transaction event rejected");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
