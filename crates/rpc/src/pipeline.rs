//! Evaluate → alert → publish
//!
//! The pipeline is the single path from an inbound action to a decision and
//! any alert it produces. Transaction events observed on-chain enter through
//! [`TransactionEventHandler`] and additionally settle into the holdings book.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokenguard_alerts::{AlertFactory, AlertHub};
use tokenguard_cache::TtlCache;
use tokenguard_core::{ActionRequest, Alert, Decision};
use tokenguard_lifecycle::LifecycleStore;
use tokenguard_risk::Evaluator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RpcResult;
use crate::ingest::TransactionEvent;

/// Result of running one request through the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    /// Live connections the alert was queued for
    pub delivered_to: usize,
    /// Decision came from the idempotency store; no alert was raised again
    pub replayed: bool,
}

/// Consumer of transaction events from any [`TransactionEventSource`](crate::ingest::TransactionEventSource)
#[async_trait]
pub trait TransactionEventHandler: Send + Sync {
    async fn on_transaction_event(&self, event: TransactionEvent) -> RpcResult<Outcome>;
}

pub struct Pipeline {
    evaluator: Arc<Evaluator>,
    hub: Arc<AlertHub>,
    factory: AlertFactory,
    lifecycle: Arc<LifecycleStore>,
    /// Transaction hashes already applied to the holdings book, kept for
    /// the same window as stored decisions
    settled: TtlCache<()>,
}

impl Pipeline {
    pub fn new(
        evaluator: Arc<Evaluator>,
        hub: Arc<AlertHub>,
        factory: AlertFactory,
        lifecycle: Arc<LifecycleStore>,
    ) -> Self {
        let settled = TtlCache::with_default_ttl(evaluator.config().idempotency_ttl());
        Self {
            evaluator,
            hub,
            factory,
            lifecycle,
            settled,
        }
    }

    /// Override how long a settled transaction hash is remembered
    pub fn with_settlement_ttl(mut self, ttl: Duration) -> Self {
        self.settled = TtlCache::with_default_ttl(ttl);
        self
    }

    pub fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }

    pub fn hub(&self) -> &Arc<AlertHub> {
        &self.hub
    }

    pub fn factory(&self) -> &AlertFactory {
        &self.factory
    }

    /// Evaluate and alert. A replayed decision already raised its alert,
    /// so it is returned without publishing anything.
    pub async fn process(&self, request: &ActionRequest) -> RpcResult<Outcome> {
        let evaluation = self.evaluator.evaluate_detailed(request).await?;
        let decision = evaluation.decision;

        if evaluation.replayed {
            return Ok(Outcome {
                decision,
                alert: None,
                delivered_to: 0,
                replayed: true,
            });
        }

        let alert = self.factory.from_decision(&decision, request);
        let delivered_to = match &alert {
            Some(alert) => self.hub.publish(alert.clone())?,
            None => 0,
        };

        Ok(Outcome {
            decision,
            alert,
            delivered_to,
            replayed: false,
        })
    }

    /// Settled transaction hashes currently remembered
    pub fn settled_len(&self) -> usize {
        self.settled.len()
    }

    /// Release stored decisions and settled hashes past their window
    pub fn purge_expired(&self) -> usize {
        let purged = self.evaluator.purge_expired() + self.settled.purge_expired();
        if purged > 0 {
            debug!(purged, "Expired pipeline state purged");
        }
        purged
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until `shutdown` flips to true
    pub fn spawn_purger(self: &Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        pipeline.purge_expired();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Purger stopped");
        })
    }
}

#[async_trait]
impl TransactionEventHandler for Pipeline {
    /// Evaluate the observed transfer, then settle it.
    ///
    /// The chain is the source of truth for balances, so settlement happens
    /// whatever the decision; the decision drives alerting only. A
    /// re-delivered event replays its decision and settles once.
    async fn on_transaction_event(&self, event: TransactionEvent) -> RpcResult<Outcome> {
        let request = event.to_request();
        let outcome = self.process(&request).await?;

        if !self.settled.insert_if_absent(event.tx_hash.clone(), ()) {
            debug!(tx_hash = %event.tx_hash, "Transaction already settled");
        } else if let Err(e) = self
            .lifecycle
            .apply_transfer(&event.token_id, &event.from, &event.to, event.amount)
        {
            warn!(tx_hash = %event.tx_hash, error = %e, "Observed transfer could not be settled");
        }

        info!(
            tx_hash = %event.tx_hash,
            status = %outcome.decision.status,
            risk_score = outcome.decision.risk_score,
            alerted = outcome.alert.is_some(),
            replayed = outcome.replayed,
            "Transaction event processed"
        );
        Ok(outcome)
    }
}
