//! Composite evaluator
//!
//! ```text
//! ActionRequest ─► validate ─► idempotency lookup ─► JoinSet of checks
//!                                                        │
//!   RecordSink ◄─ Decision ◄─ aggregate::decide ◄────────┘
//! ```
//!
//! A check that errors, times out or panics is replaced by a neutral
//! degraded result, so a valid request always gets a decision.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use rust_decimal::Decimal;
use tokenguard_cache::CacheConfig;
use tokenguard_core::{ActionRequest, CheckResult, ComplianceRecord, Decision, RecordSink};
use tokenguard_lifecycle::LifecycleStore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::aggregate;
use crate::checks::{default_checks, CheckContext, CheckKind, RuleCheck};
use crate::config::RiskConfig;
use crate::error::{CheckError, RiskError, RiskResult};
use crate::idempotency::{fingerprint, IdempotencyGuard};
use crate::provider::{IdentityProvider, InMemoryIdentityRegistry, InMemoryRiskScreen, RiskScreenProvider};

/// Reason attached to every degraded check result
pub const CHECK_UNAVAILABLE: &str = "check unavailable";

/// A decision plus whether it came from the idempotency store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    /// Same request id and payload seen before; nothing was re-run or re-recorded
    pub replayed: bool,
}

pub struct Evaluator {
    ctx: Arc<CheckContext>,
    checks: HashMap<CheckKind, Arc<dyn RuleCheck>>,
    idempotency: IdempotencyGuard,
    sink: Option<Arc<dyn RecordSink>>,
}

impl Evaluator {
    pub fn builder(config: RiskConfig) -> EvaluatorBuilder {
        EvaluatorBuilder::new(config)
    }

    pub fn config(&self) -> &RiskConfig {
        &self.ctx.config
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleStore> {
        &self.ctx.lifecycle
    }

    /// Evaluate a request.
    ///
    /// Errors only for invalid input, an idempotency conflict or an
    /// infrastructure fault; non-compliance is a rejected decision.
    pub async fn evaluate(&self, request: &ActionRequest) -> RiskResult<Decision> {
        self.evaluate_detailed(request).await.map(|evaluation| evaluation.decision)
    }

    /// [`evaluate`](Self::evaluate), also reporting whether the decision is a replay
    pub async fn evaluate_detailed(&self, request: &ActionRequest) -> RiskResult<Evaluation> {
        request.validate()?;

        let fingerprint = fingerprint(request)?;
        if let Some(decision) = self.idempotency.lookup(&request.request_id, &fingerprint)? {
            debug!(request_id = %request.request_id, "Replaying stored decision");
            return Ok(Evaluation {
                decision,
                replayed: true,
            });
        }

        let kind = request.kind();
        let weights = self
            .ctx
            .config
            .check_set(kind)
            .ok_or_else(|| RiskError::Internal(format!("no check set configured for {}", kind)))?;

        let results = self.run_checks(request, weights).await;
        let verdict = aggregate::decide(request, &results, weights, &self.ctx.config);

        let decision = Decision {
            request_id: request.request_id.clone(),
            status: verdict.status,
            risk_score: verdict.risk_score,
            reasoning: verdict.reasoning,
            checks: results
                .into_iter()
                .map(|(kind, result)| (kind.to_string(), result))
                .collect(),
            timestamp: request.evaluated_at(),
        };

        if let Some(sink) = &self.sink {
            sink.append(&ComplianceRecord::decision(&decision)).map_err(|e| {
                error!(request_id = %decision.request_id, error = %e, "Failed to persist decision");
                RiskError::Persistence(e)
            })?;
        }

        self.idempotency.remember(fingerprint, &decision);

        info!(
            request_id = %decision.request_id,
            kind = %kind,
            status = %decision.status,
            risk_score = decision.risk_score,
            "Decision recorded"
        );

        Ok(Evaluation {
            decision,
            replayed: false,
        })
    }

    /// Drop stored decisions whose idempotency window has passed
    pub fn purge_expired(&self) -> usize {
        let purged = self.idempotency.purge_expired();
        if purged > 0 {
            debug!(purged, "Expired decisions purged");
        }
        purged
    }

    /// Decisions currently held for replay
    pub fn stored_decisions(&self) -> usize {
        self.idempotency.len()
    }

    /// Drop cached identity / screening answers after upstream data changed
    pub fn invalidate_subject(&self, subject_id: &str) -> usize {
        let removed = self.ctx.invalidate_subject(subject_id);
        info!(subject_id, removed, "Subject cache invalidated");
        removed
    }

    /// Run every weighted check concurrently and wait for all of them
    async fn run_checks(
        &self,
        request: &ActionRequest,
        weights: &BTreeMap<CheckKind, Decimal>,
    ) -> BTreeMap<CheckKind, CheckResult> {
        let shared = Arc::new(request.clone());
        let timeout = self.ctx.config.check_timeout();
        let timeout_ms = self.ctx.config.check_timeout_ms;
        let mut tasks = JoinSet::new();

        for kind in weights.keys().copied() {
            let check = self.checks.get(&kind).cloned();
            let ctx = Arc::clone(&self.ctx);
            let request = Arc::clone(&shared);

            tasks.spawn(async move {
                let outcome = match check {
                    Some(check) => {
                        let run = AssertUnwindSafe(check.evaluate(&request, &ctx)).catch_unwind();
                        match tokio::time::timeout(timeout, run).await {
                            Ok(Ok(outcome)) => outcome,
                            Ok(Err(panic)) => Err(CheckError::Aborted(panic_message(panic))),
                            Err(_) => Err(CheckError::Timeout(timeout_ms)),
                        }
                    }
                    None => Err(CheckError::NotRegistered(kind)),
                };
                (kind, outcome)
            });
        }

        let degraded_score = self.ctx.rules(request).degraded_check_score;
        let mut results = BTreeMap::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, Ok(result))) => {
                    debug!(
                        request_id = %request.request_id,
                        check = %kind,
                        passed = result.passed,
                        score = result.score,
                        "Check completed"
                    );
                    results.insert(kind, result);
                }
                Ok((kind, Err(e))) => {
                    warn!(
                        request_id = %request.request_id,
                        check = %kind,
                        error = %e,
                        "Check unavailable, using degraded result"
                    );
                    results.insert(kind, CheckResult::pass(degraded_score, CHECK_UNAVAILABLE));
                }
                Err(e) => {
                    // Cancelled task; the kind is recovered below from the missing entry
                    error!(request_id = %request.request_id, error = %e, "Check task cancelled");
                }
            }
        }

        for kind in weights.keys() {
            results
                .entry(*kind)
                .or_insert_with(|| CheckResult::pass(degraded_score, CHECK_UNAVAILABLE));
        }

        results
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "check panicked".to_string()
    }
}

/// Builder for [`Evaluator`]
///
/// Unset collaborators default to empty in-memory ones; with no identities
/// registered every request fails the identity check.
pub struct EvaluatorBuilder {
    config: RiskConfig,
    cache: CacheConfig,
    lifecycle: Option<Arc<LifecycleStore>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    screening: Option<Arc<dyn RiskScreenProvider>>,
    sink: Option<Arc<dyn RecordSink>>,
    overrides: Vec<Arc<dyn RuleCheck>>,
}

impl EvaluatorBuilder {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            cache: CacheConfig::default(),
            lifecycle: None,
            identity: None,
            screening: None,
            sink: None,
            overrides: Vec::new(),
        }
    }

    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<LifecycleStore>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn with_screen_provider(mut self, provider: Arc<dyn RiskScreenProvider>) -> Self {
        self.screening = Some(provider);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the default implementation for the check's kind
    pub fn with_check(mut self, check: Arc<dyn RuleCheck>) -> Self {
        self.overrides.push(check);
        self
    }

    pub fn build(self) -> RiskResult<Evaluator> {
        self.config.validate()?;

        let mut checks: HashMap<CheckKind, Arc<dyn RuleCheck>> =
            default_checks().into_iter().map(|c| (c.kind(), c)).collect();
        for check in self.overrides {
            checks.insert(check.kind(), check);
        }

        let idempotency = IdempotencyGuard::new(self.config.idempotency_ttl());
        let ctx = CheckContext::new(
            Arc::new(self.config),
            self.lifecycle.unwrap_or_default(),
            self.identity
                .unwrap_or_else(|| Arc::new(InMemoryIdentityRegistry::new())),
            self.screening.unwrap_or_else(|| Arc::new(InMemoryRiskScreen::new())),
            &self.cache,
        );

        Ok(Evaluator {
            ctx: Arc::new(ctx),
            checks,
            idempotency,
            sink: self.sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ScreenResult, VerificationStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokenguard_core::{DecisionStatus, MemorySink, TransferRequest, ValidationError};

    fn transfer(request_id: &str) -> ActionRequest {
        ActionRequest::transfer(TransferRequest {
            from: "W1".to_string(),
            to: "W2".to_string(),
            token_id: "TKN".to_string(),
            amount: dec!(10),
            amount_usd: dec!(10),
            jurisdiction: "US".to_string(),
            timestamp: Utc::now(),
        })
        .with_request_id(request_id)
    }

    fn evaluator(sink: Arc<MemorySink>) -> Evaluator {
        let identity = Arc::new(InMemoryIdentityRegistry::new());
        identity.set_status("W1", VerificationStatus::Verified);
        identity.set_status("W2", VerificationStatus::Verified);
        let screening = Arc::new(InMemoryRiskScreen::new());
        screening.set_screen("W1", ScreenResult::clear(0));
        screening.set_screen("W2", ScreenResult::clear(0));

        Evaluator::builder(RiskConfig::default())
            .with_identity_provider(identity)
            .with_screen_provider(screening)
            .with_sink(sink)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_transfer_approved_and_persisted() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(sink.clone());
        let request = transfer("REQ-1");

        let decision = evaluator.evaluate(&request).await.unwrap();

        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.checks.len(), 6);
        assert_eq!(decision.timestamp, request.evaluated_at());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_checks() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(sink.clone());
        let mut request = transfer("REQ-1");
        if let tokenguard_core::Action::Transfer(t) = &mut request.action {
            t.amount = dec!(-1);
        }

        let err = evaluator.evaluate(&request).await.unwrap_err();
        assert!(matches!(
            err,
            RiskError::Validation(ValidationError::NegativeAmount { field: "amount", .. })
        ));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_replay_does_not_append_twice() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(sink.clone());
        let request = transfer("REQ-1");

        let first = evaluator.evaluate(&request).await.unwrap();
        let second = evaluator.evaluate(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = RiskConfig {
            check_timeout_ms: 0,
            ..RiskConfig::default()
        };
        assert!(matches!(
            Evaluator::builder(config).build(),
            Err(RiskError::Config(_))
        ));
    }
}
