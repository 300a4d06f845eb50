//! Lifecycle-gated checks. A token with no registered lifecycle passes.

use async_trait::async_trait;
use tokenguard_core::{ActionRequest, CheckResult};

use super::{not_applicable, CheckContext, CheckKind, RuleCheck};
use crate::error::CheckError;

/// Recipient must be on the token's allow-list, when it has one
pub struct AllowListCheck;

#[async_trait]
impl RuleCheck for AllowListCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::AllowList
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let Some(transfer) = request.as_transfer() else {
            return Ok(not_applicable(request));
        };

        Ok(match ctx.lifecycle.is_allowed(&transfer.token_id, &transfer.to) {
            None => CheckResult::pass(0, format!("No allow-list for token {}", transfer.token_id)),
            Some(true) => CheckResult::pass(
                0,
                format!("{} is on the allow-list for {}", transfer.to, transfer.token_id),
            ),
            Some(false) => CheckResult::fail(
                ctx.config.scores.allow_list_violation,
                format!("{} is not on the allow-list for {}", transfer.to, transfer.token_id),
            ),
        })
    }
}

/// Recipient's projected holding must stay within the token's limit
pub struct HoldingLimitCheck;

#[async_trait]
impl RuleCheck for HoldingLimitCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::HoldingLimit
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let Some(transfer) = request.as_transfer() else {
            return Ok(not_applicable(request));
        };

        let status = ctx
            .lifecycle
            .holding_limit_status(&transfer.token_id, &transfer.to, transfer.amount);

        Ok(if status.is_exceeded() {
            CheckResult::fail(ctx.config.scores.holding_limit_breach, status.describe())
        } else {
            CheckResult::pass(0, status.describe())
        })
    }
}

/// Lock-up, vesting cliff and token status at the request's instant
pub struct TimeLockCheck;

#[async_trait]
impl RuleCheck for TimeLockCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::TimeLock
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let status = ctx.lifecycle.lock_status(request.token_id(), request.evaluated_at());

        Ok(if status.is_locked() {
            CheckResult::fail(ctx.config.scores.time_lock_active, status.describe())
        } else {
            CheckResult::pass(0, status.describe())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::fixture;
    use crate::config::RiskConfig;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokenguard_core::{CorporateActionRequest, CorporateActionType, TransferRequest};
    use tokenguard_lifecycle::TokenLifecycle;

    fn transfer(amount: Decimal) -> ActionRequest {
        ActionRequest::transfer(TransferRequest {
            from: "W1".to_string(),
            to: "W2".to_string(),
            token_id: "TKN".to_string(),
            amount,
            amount_usd: amount,
            jurisdiction: "US".to_string(),
            timestamp: Utc::now(),
        })
    }

    fn dividend() -> ActionRequest {
        ActionRequest::corporate(CorporateActionRequest {
            action_type: CorporateActionType::Dividend,
            token_id: "TKN".to_string(),
            jurisdiction: "US".to_string(),
            initiator: "ISSUER".to_string(),
            amount_usd: Some(dec!(5000)),
            capital_call_percent: None,
            notice_sent_at: None,
            execution_at: None,
        })
    }

    #[tokio::test]
    async fn test_allow_list_absent_passes() {
        let f = fixture(RiskConfig::default());
        let result = AllowListCheck.evaluate(&transfer(dec!(1)), &f.ctx).await.unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_allow_list_membership() {
        let f = fixture(RiskConfig::default());
        f.ctx.lifecycle.set_allow_list("TKN", ["W3"]);

        let result = AllowListCheck.evaluate(&transfer(dec!(1)), &f.ctx).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.score, 95);

        f.ctx.lifecycle.add_to_allow_list("TKN", "W2");
        let result = AllowListCheck.evaluate(&transfer(dec!(1)), &f.ctx).await.unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_allow_list_not_applicable_to_dividend() {
        let f = fixture(RiskConfig::default());
        f.ctx.lifecycle.set_allow_list("TKN", ["W3"]);

        let result = AllowListCheck.evaluate(&dividend(), &f.ctx).await.unwrap();
        assert!(result.passed);
        assert_eq!(result.reason, "Not applicable to dividend");
    }

    #[tokio::test]
    async fn test_holding_limit_breach() {
        let f = fixture(RiskConfig::default());
        f.ctx
            .lifecycle
            .register(TokenLifecycle::new("TKN", 100_000).with_holding_limit(dec!(20)))
            .unwrap();
        f.ctx.lifecycle.update_holding("TKN", "W2", dec!(19000)).unwrap();

        let result = HoldingLimitCheck.evaluate(&transfer(dec!(5000)), &f.ctx).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.score, 90);
        assert!(result.reason.contains("24%"));

        let result = HoldingLimitCheck.evaluate(&transfer(dec!(1000)), &f.ctx).await.unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_holding_limit_unknown_token_passes() {
        let f = fixture(RiskConfig::default());
        let result = HoldingLimitCheck.evaluate(&transfer(dec!(1_000_000)), &f.ctx).await.unwrap();
        assert!(result.passed);
    }

    #[tokio::test]
    async fn test_time_lock_active() {
        let f = fixture(RiskConfig::default());
        f.ctx
            .lifecycle
            .register(TokenLifecycle::new("TKN", 1000).with_lockup_until(Utc::now() + Duration::days(365)))
            .unwrap();

        let result = TimeLockCheck.evaluate(&transfer(dec!(1)), &f.ctx).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.score, 100);
        assert!(result.reason.contains("days remaining"));
    }

    #[tokio::test]
    async fn test_time_lock_expired() {
        let f = fixture(RiskConfig::default());
        f.ctx
            .lifecycle
            .register(TokenLifecycle::new("TKN", 1000).with_lockup_until(Utc::now() - Duration::days(1)))
            .unwrap();

        let result = TimeLockCheck.evaluate(&transfer(dec!(1)), &f.ctx).await.unwrap();
        assert!(result.passed);
    }
}
