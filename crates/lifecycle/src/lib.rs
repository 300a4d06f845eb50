//! TokenGuard Token Lifecycle Store
//!
//! Per-asset state consulted by the rule checks:
//!
//! - [`types::TokenLifecycle`] - lock-up end, vesting schedule, holding limit, supply
//! - [`store::LifecycleStore`] - registry + per-token serialized holdings + allow-lists
//! - [`status`] - lock-up and holding-limit evaluation against a snapshot
//!
//! Evaluation only reads. Holdings are written by the settlement
//! collaborator, one writer per token at a time.

pub mod error;
pub mod status;
pub mod store;
pub mod types;

pub use error::{LifecycleError, LifecycleResult};
pub use status::{HoldingLimitStatus, LockStatus};
pub use store::LifecycleStore;
pub use types::{InvestorHolding, TokenLifecycle, TokenStatus, VestingType};
