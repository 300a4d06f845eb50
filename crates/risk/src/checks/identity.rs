//! Party checks: identity verification and risk screening.
//!
//! Both fail closed: a party with nothing on file fails the check.

use async_trait::async_trait;
use tokenguard_core::{ActionRequest, CheckResult};

use super::{CheckContext, CheckKind, RuleCheck};
use crate::error::CheckError;
use crate::provider::VerificationStatus;

/// Every party must hold a verified identity
pub struct IdentityCheck;

#[async_trait]
impl RuleCheck for IdentityCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Kyc
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let scores = &ctx.config.scores;
        let mut unverified = Vec::new();
        let mut pending = Vec::new();

        for party in request.parties() {
            match ctx.verification_status(party).await? {
                Some(VerificationStatus::Verified) => {}
                Some(VerificationStatus::Pending) => pending.push(party.to_string()),
                Some(status) => unverified.push(format!("{} ({})", party, status)),
                None => unverified.push(format!("{} (no identity on file)", party)),
            }
        }

        if !unverified.is_empty() {
            return Ok(CheckResult::fail(
                scores.identity_unverified,
                format!("Identity not verified: {}", unverified.join(", ")),
            ));
        }
        if !pending.is_empty() {
            return Ok(CheckResult::fail(
                scores.identity_pending,
                format!("Identity verification pending: {}", pending.join(", ")),
            ));
        }

        Ok(CheckResult::pass(0, "All parties verified"))
    }
}

/// Sanctions and provider risk screen for every party
pub struct ScreeningCheck;

#[async_trait]
impl RuleCheck for ScreeningCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Aml
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let scores = &ctx.config.scores;
        let mut findings = Vec::new();
        let mut fail_score: Option<u8> = None;
        let mut highest = 0u8;

        for party in request.parties() {
            let (score, finding) = match ctx.screen(party).await? {
                None => (scores.sanctions_hit, format!("{}: no risk screen on file", party)),
                Some(screen) if screen.sanctions_hit => {
                    (scores.sanctions_hit, format!("{}: sanctions list match", party))
                }
                Some(screen) if screen.risk_score >= scores.screen_fail_threshold => (
                    screen.risk_score,
                    format!(
                        "{}: risk score {} at or above {}",
                        party, screen.risk_score, scores.screen_fail_threshold
                    ),
                ),
                Some(screen) => {
                    highest = highest.max(screen.risk_score);
                    continue;
                }
            };
            fail_score = Some(fail_score.map_or(score, |s| s.max(score)));
            findings.push(finding);
        }

        Ok(match fail_score {
            Some(score) => CheckResult::fail(score, findings.join("; ")),
            None => CheckResult::pass(highest, format!("Risk screen clear (highest score {})", highest)),
        })
    }
}
