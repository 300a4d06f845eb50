//! Risk evaluator errors
//!
//! Only validation, idempotency and infrastructure failures surface to the
//! caller. A check that cannot complete is a [`CheckError`], which the
//! evaluator absorbs into a degraded result.

use thiserror::Error;
use tokenguard_core::{SinkError, ValidationError};

use crate::checks::CheckKind;

/// Errors surfaced by [`Evaluator::evaluate`](crate::Evaluator::evaluate)
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Request {0} was already evaluated with a different payload")]
    IdempotencyConflict(String),

    #[error("Failed to persist decision: {0}")]
    Persistence(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RiskError {
    /// Infrastructure failures the caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, RiskError::Persistence(_) | RiskError::Internal(_))
    }
}

/// Result type for evaluator operations
pub type RiskResult<T> = Result<T, RiskError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

/// External data provider failures (identity, risk screening)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// A check that could not reach a verdict
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Check timed out after {0}ms")]
    Timeout(u64),

    #[error("No implementation registered for check {0}")]
    NotRegistered(CheckKind),

    #[error("Check task aborted: {0}")]
    Aborted(String),
}
