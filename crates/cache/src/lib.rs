//! TokenGuard Cache Layer
//!
//! Memoizes expensive check inputs (identity status, risk screens,
//! idempotent decisions) with per-entry TTL and pattern invalidation.
//!
//! ## Key Components
//!
//! - [`config::CacheConfig`] - default TTL (24h)
//! - [`ttl::TtlCache`] - sharded map with `get_or_compute` and `invalidate(pattern)`
//! - [`pattern::glob_match`] - `*` wildcard matcher used by invalidation

pub mod config;
pub mod pattern;
pub mod ttl;

pub use config::CacheConfig;
pub use pattern::glob_match;
pub use ttl::{CacheStats, TtlCache};
