//! Evaluation decision

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::check::CheckResult;

/// Tri-state outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Approved,
    Escalated,
    Rejected,
}

/// Outcome of evaluating one [`ActionRequest`](crate::ActionRequest)
///
/// `checks` is keyed by check name; a `BTreeMap` keeps serialization
/// order stable so identical evaluations produce identical records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub request_id: String,
    pub status: DecisionStatus,
    pub risk_score: u8,
    pub reasoning: String,
    pub checks: BTreeMap<String, CheckResult>,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        self.status == DecisionStatus::Approved
    }

    pub fn is_escalated(&self) -> bool {
        self.status == DecisionStatus::Escalated
    }

    pub fn is_rejected(&self) -> bool {
        self.status == DecisionStatus::Rejected
    }

    /// Names of checks that did not pass
    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, result)| !result.passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(DecisionStatus::Approved.to_string(), "APPROVED");
        assert_eq!(DecisionStatus::Escalated.to_string(), "ESCALATED");
        assert_eq!(
            serde_json::to_string(&DecisionStatus::Rejected).unwrap(),
            "\"REJECTED\""
        );
    }

    #[test]
    fn test_failed_checks() {
        let mut checks = BTreeMap::new();
        checks.insert("kyc".to_string(), CheckResult::pass(0, "verified"));
        checks.insert("aml".to_string(), CheckResult::fail(100, "sanctions hit"));

        let decision = Decision {
            request_id: "REQ-1".to_string(),
            status: DecisionStatus::Rejected,
            risk_score: 100,
            reasoning: "Hard block: aml".to_string(),
            checks,
            timestamp: Utc::now(),
        };

        assert!(decision.is_rejected());
        assert_eq!(decision.failed_checks(), vec!["aml"]);
    }
}
