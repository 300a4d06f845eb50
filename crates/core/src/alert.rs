//! Alerts streamed to live subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum_macros::Display;

/// Alert severity - ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

/// What triggered the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertType {
    SanctionsHit,
    IdentityUnverified,
    LockupViolation,
    HoldingLimitBreach,
    TerritorialRestriction,
    TransferRejected,
    TransferEscalated,
    CorporateActionRejected,
    CorporateActionEscalated,
}

/// Immutable alert record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    /// Wallet or account the alert is scoped to
    pub subject_id: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub risk_score: u8,
    /// Request that produced the alert
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Create an alert with a fresh id, stamped now
    pub fn new(
        subject_id: impl Into<String>,
        jurisdiction: Option<String>,
        alert_type: AlertType,
        severity: Severity,
        message: impl Into<String>,
        risk_score: u8,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            jurisdiction,
            alert_type,
            severity,
            message: message.into(),
            risk_score,
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_alert_serialization() {
        let alert = Alert::new(
            "W1",
            Some("US".to_string()),
            AlertType::SanctionsHit,
            Severity::Critical,
            "Sanctions match",
            100,
            "REQ-1",
        );
        let json = serde_json::to_string(&alert).unwrap();

        assert!(json.contains("sanctions_hit"));
        assert!(json.contains("CRITICAL"));
        assert_eq!(AlertType::HoldingLimitBreach.to_string(), "holding_limit_breach");
    }
}
