//! External data providers consulted by the identity and screening checks
//!
//! The evaluator only sees the traits. In-memory registries back tests,
//! the CLI seed data and local deployments; both can be switched into an
//! outage to exercise the degraded path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::ProviderError;

/// Identity verification status reported by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Pending,
    Rejected,
    Expired,
}

/// Risk screen for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResult {
    /// Provider risk score (0-100)
    pub risk_score: u8,
    #[serde(default)]
    pub sanctions_hit: bool,
}

impl ScreenResult {
    pub fn clear(risk_score: u8) -> Self {
        Self {
            risk_score: risk_score.min(100),
            sanctions_hit: false,
        }
    }

    pub fn sanctioned() -> Self {
        Self {
            risk_score: 100,
            sanctions_hit: true,
        }
    }
}

/// Identity verification lookup. `Ok(None)` means no identity on file.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verification_status(&self, subject_id: &str) -> Result<Option<VerificationStatus>, ProviderError>;
}

/// Sanctions / risk screening lookup. `Ok(None)` means never screened.
#[async_trait]
pub trait RiskScreenProvider: Send + Sync {
    async fn screen(&self, subject_id: &str) -> Result<Option<ScreenResult>, ProviderError>;
}

/// In-memory identity registry
#[derive(Default)]
pub struct InMemoryIdentityRegistry {
    statuses: RwLock<HashMap<String, VerificationStatus>>,
    outage: AtomicBool,
}

impl InMemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, subject_id: impl Into<String>, status: VerificationStatus) {
        self.statuses.write().insert(subject_id.into(), status);
    }

    pub fn remove(&self, subject_id: &str) -> Option<VerificationStatus> {
        self.statuses.write().remove(subject_id)
    }

    /// Simulate the provider being unreachable
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityRegistry {
    async fn verification_status(&self, subject_id: &str) -> Result<Option<VerificationStatus>, ProviderError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("identity registry offline".to_string()));
        }
        Ok(self.statuses.read().get(subject_id).copied())
    }
}

/// In-memory risk screen
#[derive(Default)]
pub struct InMemoryRiskScreen {
    screens: RwLock<HashMap<String, ScreenResult>>,
    outage: AtomicBool,
}

impl InMemoryRiskScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_screen(&self, subject_id: impl Into<String>, result: ScreenResult) {
        self.screens.write().insert(subject_id.into(), result);
    }

    pub fn remove(&self, subject_id: &str) -> Option<ScreenResult> {
        self.screens.write().remove(subject_id)
    }

    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }
}

#[async_trait]
impl RiskScreenProvider for InMemoryRiskScreen {
    async fn screen(&self, subject_id: &str) -> Result<Option<ScreenResult>, ProviderError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("risk screen offline".to_string()));
        }
        Ok(self.screens.read().get(subject_id).cloned())
    }
}
