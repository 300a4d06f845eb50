//! Rule checks
//!
//! A closed set of [`CheckKind`]s behind one async [`RuleCheck`] trait.
//! Each check maps a request plus lifecycle / provider state to a
//! [`CheckResult`]. Expected non-compliance is a failed result; only a
//! check that cannot reach a verdict returns [`CheckError`].

mod asset;
mod identity;
mod jurisdiction;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tokenguard_cache::{CacheConfig, TtlCache};
use tokenguard_core::{ActionRequest, CheckResult};
use tokenguard_lifecycle::LifecycleStore;

use crate::config::{JurisdictionRules, RiskConfig};
use crate::error::{CheckError, ProviderError};
use crate::provider::{IdentityProvider, RiskScreenProvider, ScreenResult, VerificationStatus};

pub use asset::{AllowListCheck, HoldingLimitCheck, TimeLockCheck};
pub use identity::{IdentityCheck, ScreeningCheck};
pub use jurisdiction::{NoticePeriodCheck, ReportingThresholdCheck, TerritorialCheck};

/// Every check the evaluator knows how to run
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckKind {
    /// Identity verification status of every party
    Kyc,
    /// Sanctions and risk screening of every party
    Aml,
    AllowList,
    HoldingLimit,
    /// Lock-up and vesting cliff
    TimeLock,
    Territorial,
    NoticePeriod,
    ReportingThreshold,
}

/// A single rule check
#[async_trait]
pub trait RuleCheck: Send + Sync {
    fn kind(&self) -> CheckKind;

    async fn evaluate(&self, request: &ActionRequest, ctx: &CheckContext) -> Result<CheckResult, CheckError>;
}

/// State shared by every check of one evaluator
pub struct CheckContext {
    pub config: Arc<RiskConfig>,
    pub lifecycle: Arc<LifecycleStore>,
    identity: Arc<dyn IdentityProvider>,
    screening: Arc<dyn RiskScreenProvider>,
    identity_cache: TtlCache<Option<VerificationStatus>>,
    screening_cache: TtlCache<Option<ScreenResult>>,
}

impl CheckContext {
    pub fn new(
        config: Arc<RiskConfig>,
        lifecycle: Arc<LifecycleStore>,
        identity: Arc<dyn IdentityProvider>,
        screening: Arc<dyn RiskScreenProvider>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            config,
            lifecycle,
            identity,
            screening,
            identity_cache: TtlCache::new(cache),
            screening_cache: TtlCache::new(cache),
        }
    }

    /// Jurisdiction rules for the request
    pub fn rules(&self, request: &ActionRequest) -> &JurisdictionRules {
        self.config.jurisdiction(request.jurisdiction())
    }

    /// Cached identity lookup (`kyc:{subject}`)
    pub async fn verification_status(&self, subject_id: &str) -> Result<Option<VerificationStatus>, ProviderError> {
        self.identity_cache
            .get_or_compute(
                &format!("kyc:{}", subject_id),
                || self.identity.verification_status(subject_id),
                self.config.provider_cache_ttl(),
            )
            .await
    }

    /// Cached risk screen (`aml:{subject}`)
    pub async fn screen(&self, subject_id: &str) -> Result<Option<ScreenResult>, ProviderError> {
        self.screening_cache
            .get_or_compute(
                &format!("aml:{}", subject_id),
                || self.screening.screen(subject_id),
                self.config.provider_cache_ttl(),
            )
            .await
    }

    /// Drop every cached provider answer about `subject_id`
    pub fn invalidate_subject(&self, subject_id: &str) -> usize {
        let pattern = format!("*:{}", subject_id);
        self.identity_cache.invalidate(&pattern) + self.screening_cache.invalidate(&pattern)
    }
}

/// One implementation per [`CheckKind`]
pub fn default_checks() -> Vec<Arc<dyn RuleCheck>> {
    vec![
        Arc::new(IdentityCheck),
        Arc::new(ScreeningCheck),
        Arc::new(AllowListCheck),
        Arc::new(HoldingLimitCheck),
        Arc::new(TimeLockCheck),
        Arc::new(TerritorialCheck),
        Arc::new(NoticePeriodCheck),
        Arc::new(ReportingThresholdCheck),
    ]
}

/// Result for a check that does not apply to this request kind
fn not_applicable(request: &ActionRequest) -> CheckResult {
    CheckResult::pass(0, format!("Not applicable to {}", request.kind()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::provider::{InMemoryIdentityRegistry, InMemoryRiskScreen};

    pub struct Fixture {
        pub identity: Arc<InMemoryIdentityRegistry>,
        pub screening: Arc<InMemoryRiskScreen>,
        pub ctx: CheckContext,
    }

    pub fn fixture(config: RiskConfig) -> Fixture {
        let identity = Arc::new(InMemoryIdentityRegistry::new());
        let screening = Arc::new(InMemoryRiskScreen::new());
        let ctx = CheckContext::new(
            Arc::new(config),
            Arc::new(LifecycleStore::new()),
            identity.clone(),
            screening.clone(),
            &CacheConfig::default(),
        );
        Fixture {
            identity,
            screening,
            ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;
    use test_support::fixture;

    #[test]
    fn test_every_kind_has_a_default_check() {
        let checks = default_checks();
        for kind in CheckKind::iter() {
            assert!(checks.iter().any(|c| c.kind() == kind), "missing {}", kind);
        }
        assert_eq!(checks.len(), CheckKind::iter().count());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(CheckKind::HoldingLimit.to_string(), "holding_limit");
        assert_eq!("time_lock".parse::<CheckKind>().unwrap(), CheckKind::TimeLock);
    }

    #[tokio::test]
    async fn test_provider_answers_are_cached_until_invalidated() {
        let f = fixture(RiskConfig::default());
        f.identity.set_status("W1", VerificationStatus::Pending);

        assert_eq!(f.ctx.verification_status("W1").await, Ok(Some(VerificationStatus::Pending)));

        f.identity.set_status("W1", VerificationStatus::Verified);
        assert_eq!(f.ctx.verification_status("W1").await, Ok(Some(VerificationStatus::Pending)));

        f.screening.set_screen("W1", ScreenResult::clear(5));
        f.ctx.screen("W1").await.unwrap();

        assert_eq!(f.ctx.invalidate_subject("W1"), 2);
        assert_eq!(f.ctx.verification_status("W1").await, Ok(Some(VerificationStatus::Verified)));
    }

    #[tokio::test]
    async fn test_provider_errors_are_not_cached() {
        let f = fixture(RiskConfig::default());
        f.identity.set_status("W1", VerificationStatus::Verified);
        f.identity.set_outage(true);
        assert!(f.ctx.verification_status("W1").await.is_err());

        f.identity.set_outage(false);
        assert_eq!(f.ctx.verification_status("W1").await, Ok(Some(VerificationStatus::Verified)));
    }
}
