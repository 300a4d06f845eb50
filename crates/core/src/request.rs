//! Action requests - immutable inputs to the risk evaluator
//!
//! A request is either a token transfer or a corporate action
//! (dividend, redemption, capital call). The `request_id` doubles as
//! the idempotency key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{ValidationError, ValidationResult};

/// Corporate action subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CorporateActionType {
    Dividend,
    Redemption,
    CapitalCall,
}

/// Request kind used to select the applicable check set
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    Transfer,
    Dividend,
    Redemption,
    CapitalCall,
}

impl From<CorporateActionType> for RequestKind {
    fn from(action: CorporateActionType) -> Self {
        match action {
            CorporateActionType::Dividend => RequestKind::Dividend,
            CorporateActionType::Redemption => RequestKind::Redemption,
            CorporateActionType::CapitalCall => RequestKind::CapitalCall,
        }
    }
}

/// Token transfer between two wallets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub token_id: String,
    /// Token units
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub jurisdiction: String,
    pub timestamp: DateTime<Utc>,
}

/// Dividend, redemption or capital call on a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporateActionRequest {
    pub action_type: CorporateActionType,
    pub token_id: String,
    pub jurisdiction: String,
    pub initiator: String,
    #[serde(default)]
    pub amount_usd: Option<Decimal>,
    /// Percent of committed capital requested (capital calls only)
    #[serde(default)]
    pub capital_call_percent: Option<Decimal>,
    #[serde(default)]
    pub notice_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_at: Option<DateTime<Utc>>,
}

/// The action being proposed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Transfer(TransferRequest),
    CorporateAction(CorporateActionRequest),
}

/// Envelope submitted to the evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Idempotency key
    pub request_id: String,
    pub submitted_at: DateTime<Utc>,
    pub action: Action,
}

impl ActionRequest {
    /// Wrap an action with a generated request id
    pub fn new(action: Action) -> Self {
        let submitted_at = match &action {
            Action::Transfer(t) => t.timestamp,
            Action::CorporateAction(_) => Utc::now(),
        };
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            submitted_at,
            action,
        }
    }

    /// Create a transfer request
    pub fn transfer(transfer: TransferRequest) -> Self {
        Self::new(Action::Transfer(transfer))
    }

    /// Create a corporate action request
    pub fn corporate(action: CorporateActionRequest) -> Self {
        Self::new(Action::CorporateAction(action))
    }

    /// Use a caller-supplied request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Override the submission time
    pub fn with_submitted_at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = submitted_at;
        self
    }

    pub fn kind(&self) -> RequestKind {
        match &self.action {
            Action::Transfer(_) => RequestKind::Transfer,
            Action::CorporateAction(c) => c.action_type.into(),
        }
    }

    pub fn token_id(&self) -> &str {
        match &self.action {
            Action::Transfer(t) => &t.token_id,
            Action::CorporateAction(c) => &c.token_id,
        }
    }

    pub fn jurisdiction(&self) -> &str {
        match &self.action {
            Action::Transfer(t) => &t.jurisdiction,
            Action::CorporateAction(c) => &c.jurisdiction,
        }
    }

    /// The account the decision is primarily about (sender or initiator)
    pub fn subject_id(&self) -> &str {
        match &self.action {
            Action::Transfer(t) => &t.from,
            Action::CorporateAction(c) => &c.initiator,
        }
    }

    /// Every account whose identity must be verified
    pub fn parties(&self) -> Vec<&str> {
        match &self.action {
            Action::Transfer(t) => vec![t.from.as_str(), t.to.as_str()],
            Action::CorporateAction(c) => vec![c.initiator.as_str()],
        }
    }

    pub fn amount_usd(&self) -> Decimal {
        match &self.action {
            Action::Transfer(t) => t.amount_usd,
            Action::CorporateAction(c) => c.amount_usd.unwrap_or(Decimal::ZERO),
        }
    }

    pub fn as_transfer(&self) -> Option<&TransferRequest> {
        match &self.action {
            Action::Transfer(t) => Some(t),
            Action::CorporateAction(_) => None,
        }
    }

    pub fn as_corporate(&self) -> Option<&CorporateActionRequest> {
        match &self.action {
            Action::Transfer(_) => None,
            Action::CorporateAction(c) => Some(c),
        }
    }

    /// The instant every time-dependent check evaluates against.
    ///
    /// Never the wall clock, so replays of the same request are stable.
    pub fn evaluated_at(&self) -> DateTime<Utc> {
        match &self.action {
            Action::Transfer(t) => t.timestamp,
            Action::CorporateAction(_) => self.submitted_at,
        }
    }

    /// Structural validation; runs before any check
    pub fn validate(&self) -> ValidationResult<()> {
        if self.request_id.trim().is_empty() {
            return Err(ValidationError::MissingField("request_id"));
        }

        match &self.action {
            Action::Transfer(t) => t.validate(),
            Action::CorporateAction(c) => c.validate(),
        }
    }
}

fn require(value: &str, field: &'static str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn non_negative(value: Decimal, field: &'static str) -> ValidationResult<()> {
    if value < Decimal::ZERO {
        Err(ValidationError::NegativeAmount { field, value })
    } else {
        Ok(())
    }
}

impl TransferRequest {
    fn validate(&self) -> ValidationResult<()> {
        require(&self.from, "from")?;
        require(&self.to, "to")?;
        require(&self.token_id, "token_id")?;
        require(&self.jurisdiction, "jurisdiction")?;
        non_negative(self.amount, "amount")?;
        non_negative(self.amount_usd, "amount_usd")
    }
}

impl CorporateActionRequest {
    /// Days between notice and execution (capital calls)
    pub fn notice_period_days(&self) -> Option<i64> {
        match (self.notice_sent_at, self.execution_at) {
            (Some(sent), Some(exec)) => Some((exec - sent).num_days()),
            _ => None,
        }
    }

    fn validate(&self) -> ValidationResult<()> {
        require(&self.token_id, "token_id")?;
        require(&self.initiator, "initiator")?;
        require(&self.jurisdiction, "jurisdiction")?;

        if let Some(amount) = self.amount_usd {
            non_negative(amount, "amount_usd")?;
        }

        if let Some(percent) = self.capital_call_percent {
            if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
                return Err(ValidationError::OutOfRange {
                    field: "capital_call_percent",
                    value: percent,
                });
            }
        }

        if self.action_type == CorporateActionType::CapitalCall {
            if self.capital_call_percent.is_none() {
                return Err(ValidationError::MissingField("capital_call_percent"));
            }
            let sent = self
                .notice_sent_at
                .ok_or(ValidationError::MissingField("notice_sent_at"))?;
            let exec = self
                .execution_at
                .ok_or(ValidationError::MissingField("execution_at"))?;
            if exec < sent {
                return Err(ValidationError::InvalidSchedule(format!(
                    "execution {} precedes notice {}",
                    exec, sent
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn transfer() -> TransferRequest {
        TransferRequest {
            from: "W1".to_string(),
            to: "W2".to_string(),
            token_id: "TKN".to_string(),
            amount: dec!(100),
            amount_usd: dec!(2500),
            jurisdiction: "US".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn capital_call(notice_days: i64) -> CorporateActionRequest {
        let sent = Utc::now();
        CorporateActionRequest {
            action_type: CorporateActionType::CapitalCall,
            token_id: "FUND-1".to_string(),
            jurisdiction: "US".to_string(),
            initiator: "GP-1".to_string(),
            amount_usd: Some(dec!(1000000)),
            capital_call_percent: Some(dec!(25)),
            notice_sent_at: Some(sent),
            execution_at: Some(sent + Duration::days(notice_days)),
        }
    }

    #[test]
    fn test_transfer_accessors() {
        let t = transfer();
        let req = ActionRequest::transfer(t.clone()).with_request_id("REQ-1");

        assert_eq!(req.request_id, "REQ-1");
        assert_eq!(req.kind(), RequestKind::Transfer);
        assert_eq!(req.subject_id(), "W1");
        assert_eq!(req.parties(), vec!["W1", "W2"]);
        assert_eq!(req.amount_usd(), dec!(2500));
        assert_eq!(req.evaluated_at(), t.timestamp);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut t = transfer();
        t.amount_usd = dec!(-1);
        let req = ActionRequest::transfer(t);

        assert_eq!(
            req.validate(),
            Err(ValidationError::NegativeAmount {
                field: "amount_usd",
                value: dec!(-1)
            })
        );
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut t = transfer();
        t.to = "  ".to_string();
        let req = ActionRequest::transfer(t);

        assert_eq!(req.validate(), Err(ValidationError::MissingField("to")));
    }

    #[test]
    fn test_zero_amount_is_valid() {
        let mut t = transfer();
        t.amount = Decimal::ZERO;
        t.amount_usd = Decimal::ZERO;
        assert!(ActionRequest::transfer(t).validate().is_ok());
    }

    #[test]
    fn test_capital_call_requires_schedule() {
        let mut call = capital_call(30);
        call.notice_sent_at = None;
        let req = ActionRequest::corporate(call);

        assert_eq!(
            req.validate(),
            Err(ValidationError::MissingField("notice_sent_at"))
        );
    }

    #[test]
    fn test_capital_call_execution_before_notice() {
        let req = ActionRequest::corporate(capital_call(-2));
        assert!(matches!(
            req.validate(),
            Err(ValidationError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_capital_call_percent_range() {
        let mut call = capital_call(30);
        call.capital_call_percent = Some(dec!(120));
        let req = ActionRequest::corporate(call);

        assert!(matches!(
            req.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_notice_period_days() {
        let call = capital_call(10);
        assert_eq!(call.notice_period_days(), Some(10));

        let req = ActionRequest::corporate(call);
        assert_eq!(req.kind(), RequestKind::CapitalCall);
        assert_eq!(req.subject_id(), "GP-1");
    }

    #[test]
    fn test_request_serialization_tagged() {
        let req = ActionRequest::transfer(transfer()).with_request_id("REQ-9");
        let json = serde_json::to_string(&req).unwrap();

        assert!(json.contains("\"kind\":\"transfer\""));

        let parsed: ActionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn test_corporate_action_partial_json() {
        let json = r#"{
            "request_id": "REQ-2",
            "submitted_at": "2026-01-01T00:00:00Z",
            "action": {
                "kind": "corporate_action",
                "action_type": "dividend",
                "token_id": "TKN",
                "jurisdiction": "SG",
                "initiator": "ISSUER"
            }
        }"#;
        let req: ActionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.kind(), RequestKind::Dividend);
        assert_eq!(req.amount_usd(), Decimal::ZERO);
        assert!(req.validate().is_ok());
    }
}
