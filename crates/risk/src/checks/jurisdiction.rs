//! Checks driven by the jurisdiction table

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokenguard_core::{ActionRequest, CheckResult, RequestKind};

use super::{not_applicable, CheckContext, CheckKind, RuleCheck};
use crate::error::CheckError;

pub struct TerritorialCheck;

#[async_trait]
impl RuleCheck for TerritorialCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Territorial
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let jurisdiction = request.jurisdiction();

        Ok(if ctx.rules(request).restricted {
            CheckResult::fail(
                ctx.config.scores.territorial_restricted,
                format!("Jurisdiction {} is restricted", jurisdiction),
            )
        } else {
            CheckResult::pass(0, format!("Jurisdiction {} permitted", jurisdiction))
        })
    }
}

/// Capital calls need the jurisdiction's minimum notice
pub struct NoticePeriodCheck;

#[async_trait]
impl RuleCheck for NoticePeriodCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::NoticePeriod
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let Some(days) = request.as_corporate().and_then(|c| c.notice_period_days()) else {
            return Ok(not_applicable(request));
        };
        let required = ctx.rules(request).notice_period_days;

        Ok(if days < required {
            CheckResult::fail(
                ctx.config.scores.notice_period_short,
                format!(
                    "Notice period of {} days below {}-day minimum for {}",
                    days,
                    required,
                    request.jurisdiction()
                ),
            )
        } else {
            CheckResult::pass(
                0,
                format!("Notice period of {} days meets {}-day minimum", days, required),
            )
        })
    }
}

/// Flags reportable amounts and estimates withholding on distributions
pub struct ReportingThresholdCheck;

#[async_trait]
impl RuleCheck for ReportingThresholdCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ReportingThreshold
    }

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError> {
        let rules = ctx.rules(request);
        let amount = request.amount_usd();
        let withholding = estimated_withholding(request.kind(), amount, rules.withholding_rate);

        Ok(if amount >= rules.reporting_threshold_usd {
            CheckResult::pass(
                ctx.config.scores.reportable_amount,
                format!(
                    "Amount ${} meets reporting threshold ${} for {}; estimated withholding ${}",
                    amount.normalize(),
                    rules.reporting_threshold_usd.normalize(),
                    request.jurisdiction(),
                    withholding
                ),
            )
        } else {
            CheckResult::pass(
                0,
                format!(
                    "Amount ${} below reporting threshold ${}; estimated withholding ${}",
                    amount.normalize(),
                    rules.reporting_threshold_usd.normalize(),
                    withholding
                ),
            )
        })
    }
}

/// Withholding applies to distributions only
fn estimated_withholding(kind: RequestKind, amount: Decimal, rate: Decimal) -> Decimal {
    match kind {
        RequestKind::Dividend | RequestKind::Redemption => (amount * rate).round_dp(2),
        _ => Decimal::ZERO,
    }
}
