//! RPC layer errors

use thiserror::Error;
use tokenguard_alerts::AlertError;
use tokenguard_core::SinkError;
use tokenguard_lifecycle::LifecycleError;
use tokenguard_risk::{ConfigError, RiskError};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Risk evaluation failed: {0}")]
    Risk(#[from] RiskError),

    #[error("Alert distribution failed: {0}")]
    Alert(#[from] AlertError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Record sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event at line {line}: {reason}")]
    MalformedEvent { line: usize, reason: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    /// Whether the failure is infrastructural rather than specific to one request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RpcError::Risk(RiskError::Persistence(_) | RiskError::Internal(_))
                | RpcError::Alert(AlertError::Sink(_))
                | RpcError::Sink(_)
                | RpcError::Io(_)
                | RpcError::MalformedEvent { .. }
                | RpcError::WebSocket(_)
        )
    }
}
