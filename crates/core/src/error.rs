//! Core errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Malformed or incomplete request - rejected before any check runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} cannot be negative: {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: Decimal },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Result type for request validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors from the record sink (persistence collaborator)
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::NegativeAmount {
            field: "amount_usd",
            value: dec!(-5),
        };
        assert!(err.to_string().contains("amount_usd"));
        assert!(err.to_string().contains("-5"));

        let err = ValidationError::MissingField("token_id");
        assert_eq!(err.to_string(), "Missing required field: token_id");
    }
}
