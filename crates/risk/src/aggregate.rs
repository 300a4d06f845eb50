//! Decision logic over a complete set of check results
//!
//! Order: hard block, then corporate-action rules, then the weighted
//! score against the reject / escalate bands. Pure, so identical inputs
//! give identical decisions.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tokenguard_core::{ActionRequest, CheckResult, DecisionStatus, RequestKind};

use crate::checks::CheckKind;
use crate::config::RiskConfig;

const MAX_SCORE: u8 = 100;

/// Status, score and reasoning for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: DecisionStatus,
    pub risk_score: u8,
    pub reasoning: String,
}

/// `round(Σ weight × score)`, half away from zero, clamped to 0..=100
pub fn weighted_score(results: &BTreeMap<CheckKind, CheckResult>, weights: &BTreeMap<CheckKind, Decimal>) -> u8 {
    let total: Decimal = weights
        .iter()
        .filter_map(|(kind, weight)| results.get(kind).map(|r| *weight * Decimal::from(r.score)))
        .sum();

    total
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap_or(MAX_SCORE)
        .min(MAX_SCORE)
}

pub fn decide(
    request: &ActionRequest,
    results: &BTreeMap<CheckKind, CheckResult>,
    weights: &BTreeMap<CheckKind, Decimal>,
    config: &RiskConfig,
) -> Verdict {
    let blockers: Vec<(&CheckKind, &CheckResult)> = results
        .iter()
        .filter(|(_, r)| r.is_hard_block(config.hard_block_score))
        .collect();

    if !blockers.is_empty() {
        let risk_score = blockers.iter().map(|(_, r)| r.score).max().unwrap_or(MAX_SCORE);
        let listed: Vec<String> = blockers
            .iter()
            .map(|(kind, r)| format!("{} ({})", kind, r.reason))
            .collect();
        return Verdict {
            status: DecisionStatus::Rejected,
            risk_score,
            reasoning: format!("Hard block: {}", listed.join("; ")),
        };
    }

    let risk_score = weighted_score(results, weights);

    if let Some((status, rule)) = corporate_rule(request, results, config) {
        return Verdict {
            status,
            risk_score,
            reasoning: format!("{}; composite risk score {}", rule, risk_score),
        };
    }

    let (status, band) = if risk_score >= config.reject_threshold {
        (
            DecisionStatus::Rejected,
            format!("at or above rejection threshold {}", config.reject_threshold),
        )
    } else if risk_score >= config.escalate_threshold {
        (
            DecisionStatus::Escalated,
            format!("at or above escalation threshold {}", config.escalate_threshold),
        )
    } else {
        (
            DecisionStatus::Approved,
            format!("below escalation threshold {}", config.escalate_threshold),
        )
    };

    let mut reasoning = format!("Composite risk score {} {}", risk_score, band);
    let failed: Vec<String> = results
        .iter()
        .filter(|(_, r)| !r.passed)
        .map(|(kind, _)| kind.to_string())
        .collect();
    if !failed.is_empty() {
        reasoning.push_str(&format!("; failed checks: {}", failed.join(", ")));
    }

    Verdict {
        status,
        risk_score,
        reasoning,
    }
}

/// Redemption and capital-call rules that override the score bands
fn corporate_rule(
    request: &ActionRequest,
    results: &BTreeMap<CheckKind, CheckResult>,
    config: &RiskConfig,
) -> Option<(DecisionStatus, String)> {
    let action = request.as_corporate()?;

    match request.kind() {
        RequestKind::Redemption => {
            if let Some(lock) = results.get(&CheckKind::TimeLock).filter(|r| !r.passed) {
                return Some((
                    DecisionStatus::Rejected,
                    format!("Redemption blocked: {}", lock.reason),
                ));
            }
            let amount = request.amount_usd();
            if amount >= config.large_redemption_threshold_usd {
                return Some((
                    DecisionStatus::Escalated,
                    format!(
                        "Redemption of ${} at or above large-redemption threshold ${}",
                        amount.normalize(),
                        config.large_redemption_threshold_usd.normalize()
                    ),
                ));
            }
            None
        }
        RequestKind::CapitalCall => {
            let required = config.jurisdiction(&action.jurisdiction).notice_period_days;
            if let Some(days) = action.notice_period_days().filter(|d| *d < required) {
                return Some((
                    DecisionStatus::Rejected,
                    format!(
                        "Capital call notice period of {} days below {}-day minimum",
                        days, required
                    ),
                ));
            }
            let percent = action.capital_call_percent?;
            if percent > config.capital_call_escalation_percent {
                return Some((
                    DecisionStatus::Escalated,
                    format!(
                        "Capital call of {}% exceeds {}% of committed capital",
                        percent.normalize(),
                        config.capital_call_escalation_percent.normalize()
                    ),
                ));
            }
            None
        }
        _ => None,
    }
}
