//! Request-id idempotency
//!
//! A decision is remembered under `decision:{request_id}` together with a
//! SHA-256 fingerprint of the action payload. Resubmitting the same payload
//! replays the stored decision; a different payload under the same id is
//! a conflict.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tokenguard_cache::TtlCache;
use tokenguard_core::{ActionRequest, Decision};

use crate::error::{RiskError, RiskResult};

/// Hex SHA-256 of the serialized action (the envelope is excluded)
pub fn fingerprint(request: &ActionRequest) -> RiskResult<String> {
    let payload =
        serde_json::to_vec(&request.action).map_err(|e| RiskError::Internal(format!("fingerprint: {}", e)))?;
    Ok(hex::encode(Sha256::digest(&payload)))
}

#[derive(Clone)]
struct StoredDecision {
    fingerprint: String,
    decision: Decision,
}

pub struct IdempotencyGuard {
    decisions: TtlCache<StoredDecision>,
}

impl IdempotencyGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            decisions: TtlCache::with_default_ttl(ttl),
        }
    }

    /// Stored decision for a replay, `None` for a first submission
    pub fn lookup(&self, request_id: &str, fingerprint: &str) -> RiskResult<Option<Decision>> {
        match self.decisions.get(&key(request_id)) {
            None => Ok(None),
            Some(stored) if stored.fingerprint == fingerprint => Ok(Some(stored.decision)),
            Some(_) => Err(RiskError::IdempotencyConflict(request_id.to_string())),
        }
    }

    pub fn remember(&self, fingerprint: String, decision: &Decision) {
        self.decisions.insert(
            key(&decision.request_id),
            StoredDecision {
                fingerprint,
                decision: decision.clone(),
            },
        );
    }

    /// Drop decisions past their TTL; returns how many went
    pub fn purge_expired(&self) -> usize {
        self.decisions.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

fn key(request_id: &str) -> String {
    format!("decision:{}", request_id)
}
