//! Lifecycle types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingType {
    Linear,
    Cliff,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    #[default]
    Active,
    Paused,
    Retired,
}

/// Per-asset lifecycle state
///
/// # Invariant
/// `total_supply > 0` whenever `holding_limit_percent` is set.
/// Enforced by [`LifecycleStore::register`](crate::LifecycleStore::register).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLifecycle {
    pub token_id: String,
    #[serde(default)]
    pub lockup_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vesting_type: Option<VestingType>,
    #[serde(default)]
    pub cliff_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub holding_limit_percent: Option<Decimal>,
    pub total_supply: u64,
    #[serde(default)]
    pub status: TokenStatus,
}

impl TokenLifecycle {
    /// Active token with no restrictions
    pub fn new(token_id: impl Into<String>, total_supply: u64) -> Self {
        Self {
            token_id: token_id.into(),
            lockup_end_date: None,
            vesting_type: None,
            cliff_date: None,
            holding_limit_percent: None,
            total_supply,
            status: TokenStatus::Active,
        }
    }

    pub fn with_lockup_until(mut self, end: DateTime<Utc>) -> Self {
        self.lockup_end_date = Some(end);
        self
    }

    pub fn with_cliff(mut self, cliff: DateTime<Utc>) -> Self {
        self.vesting_type = Some(VestingType::Cliff);
        self.cliff_date = Some(cliff);
        self
    }

    pub fn with_vesting(mut self, vesting: VestingType) -> Self {
        self.vesting_type = Some(vesting);
        self
    }

    pub fn with_holding_limit(mut self, percent: Decimal) -> Self {
        self.holding_limit_percent = Some(percent);
        self
    }

    pub fn with_status(mut self, status: TokenStatus) -> Self {
        self.status = status;
        self
    }
}

/// One holder's balance in one token
///
/// The percentage of supply is always derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorHolding {
    pub token_id: String,
    pub holder_id: String,
    pub amount: Decimal,
}

impl InvestorHolding {
    /// Share of `total_supply` in percent; `None` for a zero supply
    pub fn percent_of(&self, total_supply: u64) -> Option<Decimal> {
        if total_supply == 0 {
            return None;
        }
        Some(self.amount / Decimal::from(total_supply) * Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_derived() {
        let holding = InvestorHolding {
            token_id: "TKN".to_string(),
            holder_id: "W1".to_string(),
            amount: dec!(19000),
        };

        assert_eq!(holding.percent_of(100_000), Some(dec!(19)));
        assert_eq!(holding.percent_of(0), None);
    }

    #[test]
    fn test_lifecycle_json_defaults() {
        let json = r#"{ "token_id": "TKN", "total_supply": 1000 }"#;
        let lifecycle: TokenLifecycle = serde_json::from_str(json).unwrap();

        assert_eq!(lifecycle, TokenLifecycle::new("TKN", 1000));
        assert_eq!(lifecycle.status, TokenStatus::Active);
    }
}
