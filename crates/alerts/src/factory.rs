//! Decision → Alert conversion

use tokenguard_core::{ActionRequest, Alert, AlertType, Decision, DecisionStatus, RequestKind, Severity};

use crate::config::AlertPolicy;

/// Check names in the order they classify an alert
const CLASSIFIED_CHECKS: [(&str, AlertType); 5] = [
    ("aml", AlertType::SanctionsHit),
    ("kyc", AlertType::IdentityUnverified),
    ("time_lock", AlertType::LockupViolation),
    ("holding_limit", AlertType::HoldingLimitBreach),
    ("territorial", AlertType::TerritorialRestriction),
];

pub struct AlertFactory {
    policy: AlertPolicy,
}

impl AlertFactory {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Whether the decision crosses the alerting threshold
    pub fn should_alert(&self, decision: &Decision) -> bool {
        decision.status != DecisionStatus::Approved || decision.risk_score >= self.policy.min_risk_score
    }

    /// Alert scoped to the request's subject, or `None` below the threshold
    pub fn from_decision(&self, decision: &Decision, request: &ActionRequest) -> Option<Alert> {
        if !self.should_alert(decision) {
            return None;
        }

        let alert_type = classify(decision, request.kind());
        let message = format!(
            "{} {} {}: {}",
            request.kind(),
            decision.request_id,
            decision.status,
            decision.reasoning
        );

        Some(Alert::new(
            request.subject_id(),
            Some(request.jurisdiction().to_string()),
            alert_type,
            self.severity(decision),
            message,
            decision.risk_score,
            decision.request_id.clone(),
        ))
    }

    pub fn severity(&self, decision: &Decision) -> Severity {
        let score = decision.risk_score;
        if decision.is_rejected() && score >= self.policy.critical_score {
            Severity::Critical
        } else if score >= self.policy.high_score {
            Severity::High
        } else if score >= self.policy.medium_score {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl Default for AlertFactory {
    fn default() -> Self {
        Self::new(AlertPolicy::default())
    }
}

fn classify(decision: &Decision, kind: RequestKind) -> AlertType {
    let failed = decision.failed_checks();
    if let Some((_, alert_type)) = CLASSIFIED_CHECKS.iter().find(|(name, _)| failed.contains(name)) {
        return *alert_type;
    }

    match (kind, decision.status) {
        (RequestKind::Transfer, DecisionStatus::Rejected) => AlertType::TransferRejected,
        (RequestKind::Transfer, _) => AlertType::TransferEscalated,
        (_, DecisionStatus::Rejected) => AlertType::CorporateActionRejected,
        (_, _) => AlertType::CorporateActionEscalated,
    }
}
