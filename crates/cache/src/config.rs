//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the cache layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when the caller does not pass one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60 // 24 hours
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_one_day() {
        assert_eq!(CacheConfig::default().default_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_partial_json() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_ttl_secs, 86_400);
    }
}
