//! Lifecycle store errors

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Invalid lifecycle for {token_id}: {reason}")]
    InvalidLifecycle { token_id: String, reason: String },

    #[error("Holding amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    #[error("Insufficient holding for {holder_id} in {token_id}: available {available}, required {required}")]
    InsufficientHolding {
        token_id: String,
        holder_id: String,
        available: Decimal,
        required: Decimal,
    },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
