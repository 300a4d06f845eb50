//! Alert hub and factory configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, AlertResult};

/// Connection registry, buffer and delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// A connection without a heartbeat for longer than this is closed
    #[serde(default = "default_stale_timeout_ms")]
    pub stale_timeout_ms: u64,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Global alert history capacity (FIFO eviction)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Maximum alerts returned for REQUEST_CACHE
    #[serde(default = "default_replay_limit")]
    pub replay_limit: usize,

    /// Per-connection delivery queue; alerts beyond it are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

/// When a decision becomes an alert, and how severe it is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// Approved decisions at or above this score still alert
    #[serde(default = "default_min_risk_score")]
    pub min_risk_score: u8,

    #[serde(default = "default_critical_score")]
    pub critical_score: u8,

    #[serde(default = "default_high_score")]
    pub high_score: u8,

    #[serde(default = "default_medium_score")]
    pub medium_score: u8,
}

fn default_stale_timeout_ms() -> u64 {
    30_000
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_replay_limit() -> usize {
    100
}

fn default_queue_capacity() -> usize {
    256
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_min_risk_score() -> u8 {
    30
}

fn default_critical_score() -> u8 {
    90
}

fn default_high_score() -> u8 {
    70
}

fn default_medium_score() -> u8 {
    50
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            stale_timeout_ms: default_stale_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            buffer_capacity: default_buffer_capacity(),
            replay_limit: default_replay_limit(),
            queue_capacity: default_queue_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            min_risk_score: default_min_risk_score(),
            critical_score: default_critical_score(),
            high_score: default_high_score(),
            medium_score: default_medium_score(),
        }
    }
}

impl HubConfig {
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn validate(&self) -> AlertResult<()> {
        if self.buffer_capacity == 0 || self.queue_capacity == 0 || self.event_channel_capacity == 0 {
            return Err(AlertError::Config("capacities must be positive".to_string()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(AlertError::Config("sweep_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}
