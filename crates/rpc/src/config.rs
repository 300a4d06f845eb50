//! Application configuration
//!
//! One JSON file carries every component's settings plus optional seed
//! data for the in-memory stores. Every section is optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokenguard_alerts::{AlertPolicy, HubConfig};
use tokenguard_cache::CacheConfig;
use tokenguard_lifecycle::{InvestorHolding, TokenLifecycle};
use tokenguard_risk::{ConfigError, RiskConfig, ScreenResult, VerificationStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub alerts: AlertPolicy,

    #[serde(default)]
    pub seed: SeedData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// JSONL file receiving decision and alert records; in-memory when unset
    #[serde(default)]
    pub records_path: Option<PathBuf>,

    /// Seconds between purges of expired decisions and settled hashes
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

/// Initial contents of the in-memory stores and providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub tokens: Vec<TokenLifecycle>,

    #[serde(default)]
    pub holdings: Vec<InvestorHolding>,

    /// token_id → permitted holders
    #[serde(default)]
    pub allow_lists: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub identities: BTreeMap<String, VerificationStatus>,

    #[serde(default)]
    pub screenings: BTreeMap<String, ScreenResult>,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_purge_interval() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            records_path: None,
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl ServerConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// File config when a path is given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk.validate()?;
        self.hub
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.server.purge_interval_secs == 0 {
            return Err(ConfigError::Invalid("server.purge_interval_secs must be positive".to_string()));
        }
        if self.cache.default_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.default_ttl_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
