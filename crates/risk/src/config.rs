//! Risk evaluator configuration
//!
//! Weights, thresholds and jurisdiction tables are configuration data.
//! Every field has a serde default so a partial JSON file is enough.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokenguard_core::RequestKind;

use crate::checks::CheckKind;
use crate::error::ConfigError;

/// Weight table: request kind → (check → weight). Each row sums to 1.
pub type CheckWeights = BTreeMap<RequestKind, BTreeMap<CheckKind, Decimal>>;

/// Configuration for the composite evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    // === Decision thresholds ===
    /// A failed check at or above this score rejects on its own
    #[serde(default = "default_hard_block_score")]
    pub hard_block_score: u8,

    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: u8,

    #[serde(default = "default_escalate_threshold")]
    pub escalate_threshold: u8,

    // === Check sets ===
    #[serde(default = "default_weights")]
    pub weights: CheckWeights,

    #[serde(default)]
    pub scores: CheckScores,

    // === Corporate actions ===
    #[serde(default = "default_large_redemption_threshold_usd")]
    pub large_redemption_threshold_usd: Decimal,

    /// Capital calls above this percent of committed capital escalate
    #[serde(default = "default_capital_call_escalation_percent")]
    pub capital_call_escalation_percent: Decimal,

    // === Jurisdictions ===
    #[serde(default)]
    pub jurisdictions: BTreeMap<String, JurisdictionRules>,

    /// Rules for jurisdictions missing from the table
    #[serde(default)]
    pub default_jurisdiction: JurisdictionRules,

    // === Runtime ===
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// TTL for cached identity and screening lookups
    #[serde(default = "default_provider_cache_ttl_secs")]
    pub provider_cache_ttl_secs: u64,

    /// How long a decision stays replayable under its request id
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,
}

/// Score each check reports for a given outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckScores {
    #[serde(default = "default_identity_pending")]
    pub identity_pending: u8,

    /// Rejected, expired or missing identity
    #[serde(default = "default_identity_unverified")]
    pub identity_unverified: u8,

    #[serde(default = "default_sanctions_hit")]
    pub sanctions_hit: u8,

    /// Screen scores at or above this fail the check
    #[serde(default = "default_screen_fail_threshold")]
    pub screen_fail_threshold: u8,

    #[serde(default = "default_allow_list_violation")]
    pub allow_list_violation: u8,

    #[serde(default = "default_holding_limit_breach")]
    pub holding_limit_breach: u8,

    #[serde(default = "default_time_lock_active")]
    pub time_lock_active: u8,

    #[serde(default = "default_territorial_restricted")]
    pub territorial_restricted: u8,

    #[serde(default = "default_notice_period_short")]
    pub notice_period_short: u8,

    /// Residual risk of an amount at or above the reporting threshold
    #[serde(default = "default_reportable_amount")]
    pub reportable_amount: u8,
}

/// Per-jurisdiction table consumed by the checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionRules {
    #[serde(default = "default_reporting_threshold_usd")]
    pub reporting_threshold_usd: Decimal,

    /// Withholding rate as a fraction (0.30 = 30%)
    #[serde(default)]
    pub withholding_rate: Decimal,

    /// Minimum days between capital-call notice and execution
    #[serde(default = "default_notice_period_days")]
    pub notice_period_days: i64,

    /// Score substituted for a check that could not complete
    #[serde(default = "default_degraded_check_score")]
    pub degraded_check_score: u8,

    #[serde(default)]
    pub restricted: bool,
}

// Default value functions for serde
fn default_hard_block_score() -> u8 {
    90
}

fn default_reject_threshold() -> u8 {
    70
}

fn default_escalate_threshold() -> u8 {
    30
}

fn default_large_redemption_threshold_usd() -> Decimal {
    Decimal::new(1_000_000, 0)
}

fn default_capital_call_escalation_percent() -> Decimal {
    Decimal::new(50, 0)
}

fn default_check_timeout_ms() -> u64 {
    2_000
}

fn default_provider_cache_ttl_secs() -> u64 {
    86_400
}

fn default_idempotency_ttl_secs() -> u64 {
    86_400
}

fn default_identity_pending() -> u8 {
    60
}

fn default_identity_unverified() -> u8 {
    100
}

fn default_sanctions_hit() -> u8 {
    100
}

fn default_screen_fail_threshold() -> u8 {
    75
}

fn default_allow_list_violation() -> u8 {
    95
}

fn default_holding_limit_breach() -> u8 {
    90
}

fn default_time_lock_active() -> u8 {
    100
}

fn default_territorial_restricted() -> u8 {
    100
}

fn default_notice_period_short() -> u8 {
    100
}

fn default_reportable_amount() -> u8 {
    35
}

fn default_reporting_threshold_usd() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_notice_period_days() -> i64 {
    10
}

fn default_degraded_check_score() -> u8 {
    50
}

fn row(entries: &[(CheckKind, Decimal)]) -> BTreeMap<CheckKind, Decimal> {
    entries.iter().copied().collect()
}

fn default_weights() -> CheckWeights {
    use CheckKind::*;

    let mut weights = BTreeMap::new();
    weights.insert(
        RequestKind::Transfer,
        row(&[
            (Kyc, Decimal::new(25, 2)),
            (Aml, Decimal::new(30, 2)),
            (AllowList, Decimal::new(15, 2)),
            (HoldingLimit, Decimal::new(10, 2)),
            (TimeLock, Decimal::new(10, 2)),
            (Territorial, Decimal::new(10, 2)),
        ]),
    );
    weights.insert(
        RequestKind::Dividend,
        row(&[
            (Kyc, Decimal::new(35, 2)),
            (Aml, Decimal::new(35, 2)),
            (Territorial, Decimal::new(15, 2)),
            (ReportingThreshold, Decimal::new(15, 2)),
        ]),
    );
    weights.insert(
        RequestKind::Redemption,
        row(&[
            (Kyc, Decimal::new(25, 2)),
            (Aml, Decimal::new(30, 2)),
            (TimeLock, Decimal::new(20, 2)),
            (Territorial, Decimal::new(10, 2)),
            (ReportingThreshold, Decimal::new(15, 2)),
        ]),
    );
    weights.insert(
        RequestKind::CapitalCall,
        row(&[
            (Kyc, Decimal::new(30, 2)),
            (Aml, Decimal::new(30, 2)),
            (Territorial, Decimal::new(15, 2)),
            (NoticePeriod, Decimal::new(25, 2)),
        ]),
    );
    weights
}

impl Default for CheckScores {
    fn default() -> Self {
        Self {
            identity_pending: default_identity_pending(),
            identity_unverified: default_identity_unverified(),
            sanctions_hit: default_sanctions_hit(),
            screen_fail_threshold: default_screen_fail_threshold(),
            allow_list_violation: default_allow_list_violation(),
            holding_limit_breach: default_holding_limit_breach(),
            time_lock_active: default_time_lock_active(),
            territorial_restricted: default_territorial_restricted(),
            notice_period_short: default_notice_period_short(),
            reportable_amount: default_reportable_amount(),
        }
    }
}

impl Default for JurisdictionRules {
    fn default() -> Self {
        Self {
            reporting_threshold_usd: default_reporting_threshold_usd(),
            withholding_rate: Decimal::ZERO,
            notice_period_days: default_notice_period_days(),
            degraded_check_score: default_degraded_check_score(),
            restricted: false,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            hard_block_score: default_hard_block_score(),
            reject_threshold: default_reject_threshold(),
            escalate_threshold: default_escalate_threshold(),
            weights: default_weights(),
            scores: CheckScores::default(),
            large_redemption_threshold_usd: default_large_redemption_threshold_usd(),
            capital_call_escalation_percent: default_capital_call_escalation_percent(),
            jurisdictions: BTreeMap::new(),
            default_jurisdiction: JurisdictionRules::default(),
            check_timeout_ms: default_check_timeout_ms(),
            provider_cache_ttl_secs: default_provider_cache_ttl_secs(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
        }
    }
}

impl RiskConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RiskConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Add or replace the rules for one jurisdiction
    pub fn with_jurisdiction(mut self, code: impl Into<String>, rules: JurisdictionRules) -> Self {
        self.jurisdictions.insert(code.into(), rules);
        self
    }

    /// Rules for `code`, falling back to the default row
    pub fn jurisdiction(&self, code: &str) -> &JurisdictionRules {
        self.jurisdictions.get(code).unwrap_or(&self.default_jurisdiction)
    }

    /// Weighted checks applicable to a request kind
    pub fn check_set(&self, kind: RequestKind) -> Option<&BTreeMap<CheckKind, Decimal>> {
        self.weights.get(&kind)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn provider_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.provider_cache_ttl_secs)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escalate_threshold >= self.reject_threshold {
            return Err(ConfigError::Invalid(format!(
                "escalate_threshold ({}) must be below reject_threshold ({})",
                self.escalate_threshold, self.reject_threshold
            )));
        }
        if self.reject_threshold > 100 || self.hard_block_score > 100 {
            return Err(ConfigError::Invalid("thresholds must be within 0..=100".to_string()));
        }
        if self.check_timeout_ms == 0 {
            return Err(ConfigError::Invalid("check_timeout_ms must be positive".to_string()));
        }

        for kind in [
            RequestKind::Transfer,
            RequestKind::Dividend,
            RequestKind::Redemption,
            RequestKind::CapitalCall,
        ] {
            let Some(set) = self.weights.get(&kind) else {
                return Err(ConfigError::Invalid(format!("no check set for {}", kind)));
            };
            if set.values().any(|w| *w < Decimal::ZERO) {
                return Err(ConfigError::Invalid(format!("negative weight in {} check set", kind)));
            }
            let total: Decimal = set.values().copied().sum();
            if total != Decimal::ONE {
                return Err(ConfigError::Invalid(format!(
                    "{} check weights sum to {}, expected 1",
                    kind, total
                )));
            }
        }

        for (code, rules) in &self.jurisdictions {
            if rules.withholding_rate < Decimal::ZERO || rules.withholding_rate > Decimal::ONE {
                return Err(ConfigError::Invalid(format!(
                    "withholding_rate for {} must be within 0..=1",
                    code
                )));
            }
            if rules.notice_period_days < 0 {
                return Err(ConfigError::Invalid(format!(
                    "notice_period_days for {} must not be negative",
                    code
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = RiskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hard_block_score, 90);
        assert_eq!(config.reject_threshold, 70);
        assert_eq!(config.escalate_threshold, 30);
        assert_eq!(config.check_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_transfer_check_set() {
        let config = RiskConfig::default();
        let set = config.check_set(RequestKind::Transfer).unwrap();

        assert_eq!(set.len(), 6);
        assert!(!set.contains_key(&CheckKind::NoticePeriod));
        assert_eq!(set[&CheckKind::Aml], dec!(0.30));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "reject_threshold": 80,
            "jurisdictions": { "US": { "withholding_rate": "0.30", "restricted": false } }
        }"#;
        let config: RiskConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.reject_threshold, 80);
        assert_eq!(config.escalate_threshold, 30);
        let us = config.jurisdiction("US");
        assert_eq!(us.withholding_rate, dec!(0.30));
        assert_eq!(us.notice_period_days, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_jurisdiction_falls_back() {
        let config = RiskConfig::default().with_jurisdiction(
            "KP",
            JurisdictionRules {
                restricted: true,
                ..JurisdictionRules::default()
            },
        );

        assert!(config.jurisdiction("KP").restricted);
        assert!(!config.jurisdiction("SG").restricted);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = RiskConfig::default();
        config
            .weights
            .get_mut(&RequestKind::Dividend)
            .unwrap()
            .insert(CheckKind::Kyc, dec!(0.50));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dividend"));
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let config = RiskConfig {
            escalate_threshold: 80,
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weight_table_roundtrips_through_json() {
        let json = serde_json::to_string(&RiskConfig::default()).unwrap();
        assert!(json.contains("\"capital_call\""));
        assert!(json.contains("\"notice_period\""));

        let back: RiskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.weights, RiskConfig::default().weights);
    }
}
