//! TokenGuard Composite Risk Evaluator
//!
//! ## Pipeline
//!
//! ```text
//! ActionRequest
//!      │ validate
//!      ▼
//! ┌──────────────────────────┐
//! │ check set lookup         │ ← RiskConfig::weights[request kind]
//! └────────────┬─────────────┘
//!              ▼
//! ┌──────────────────────────┐
//! │ concurrent rule checks   │ ← LifecycleStore, providers, TtlCache
//! │ (timeout ⇒ degraded)     │
//! └────────────┬─────────────┘
//!              ▼
//! ┌──────────────────────────┐
//! │ hard block → corporate   │
//! │ rules → weighted bands   │
//! └────────────┬─────────────┘
//!              ▼
//!          Decision ──► RecordSink
//! ```
//!
//! ## Key Components
//!
//! - [`config::RiskConfig`] - weights, thresholds, jurisdiction tables
//! - [`checks::RuleCheck`] - one interface over the closed set of [`checks::CheckKind`]s
//! - [`aggregate`] - pure decision logic over check results
//! - [`evaluator::Evaluator`] - orchestrator with idempotent replay

pub mod aggregate;
pub mod checks;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod idempotency;
pub mod provider;

pub use checks::{CheckContext, CheckKind, RuleCheck};
pub use config::{CheckScores, CheckWeights, JurisdictionRules, RiskConfig};
pub use error::{CheckError, ConfigError, ProviderError, RiskError, RiskResult};
pub use evaluator::{Evaluation, Evaluator, EvaluatorBuilder};
pub use provider::{
    IdentityProvider, InMemoryIdentityRegistry, InMemoryRiskScreen, RiskScreenProvider,
    ScreenResult, VerificationStatus,
};
