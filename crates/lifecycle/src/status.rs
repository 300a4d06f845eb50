//! Lock-up and holding-limit evaluation
//!
//! Both evaluations are pure functions of a lifecycle snapshot and an
//! instant, so repeated evaluations of one request agree. A token with
//! no registered lifecycle is unrestricted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{TokenLifecycle, TokenStatus, VestingType};

const SECONDS_PER_DAY: i64 = 86_400;

/// Time-lock state of a token at an instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// No lifecycle registered
    Unrestricted,
    Unlocked,
    Locked {
        until: DateTime<Utc>,
        remaining_days: i64,
        /// Lock comes from a vesting cliff rather than the lock-up date
        cliff: bool,
    },
    /// Token paused or retired by its issuer
    Inactive(TokenStatus),
}

impl LockStatus {
    pub fn evaluate(lifecycle: Option<&TokenLifecycle>, now: DateTime<Utc>) -> Self {
        let Some(lifecycle) = lifecycle else {
            return LockStatus::Unrestricted;
        };

        if lifecycle.status != TokenStatus::Active {
            return LockStatus::Inactive(lifecycle.status);
        }

        let lockup = lifecycle.lockup_end_date.filter(|end| now < *end);
        let cliff = match lifecycle.vesting_type {
            Some(VestingType::Cliff) => lifecycle.cliff_date.filter(|date| now < *date),
            _ => None,
        };

        // The later of the two restrictions governs
        let (until, from_cliff) = match (lockup, cliff) {
            (Some(l), Some(c)) if c > l => (c, true),
            (Some(l), _) => (l, false),
            (None, Some(c)) => (c, true),
            (None, None) => return LockStatus::Unlocked,
        };

        LockStatus::Locked {
            until,
            remaining_days: remaining_days(now, until),
            cliff: from_cliff,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked { .. } | LockStatus::Inactive(_))
    }

    pub fn describe(&self) -> String {
        match self {
            LockStatus::Unrestricted => "No lifecycle registered; no time lock".to_string(),
            LockStatus::Unlocked => "Lock-up and vesting restrictions have ended".to_string(),
            LockStatus::Locked {
                until,
                remaining_days,
                cliff,
            } => {
                let source = if *cliff { "Vesting cliff" } else { "Lock-up" };
                format!(
                    "{} active until {}: {} days remaining",
                    source,
                    until.format("%Y-%m-%d"),
                    remaining_days
                )
            }
            LockStatus::Inactive(status) => format!("Token is {:?}", status).to_lowercase(),
        }
    }
}

/// Whole days left, rounded up so a lock ending later today reads as 1
fn remaining_days(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let secs = (until - now).num_seconds().max(0);
    (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Concentration outcome for a proposed acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingLimitStatus {
    /// No lifecycle or no limit configured
    Unrestricted,
    Within { projected_percent: Decimal, limit: Decimal },
    Exceeded { projected_percent: Decimal, limit: Decimal },
}

impl HoldingLimitStatus {
    /// `(current + proposed) / total_supply * 100` against the limit.
    ///
    /// Being exactly at the limit is within it.
    pub fn evaluate(lifecycle: Option<&TokenLifecycle>, current: Decimal, proposed: Decimal) -> Self {
        let Some(lifecycle) = lifecycle else {
            return HoldingLimitStatus::Unrestricted;
        };
        let Some(limit) = lifecycle.holding_limit_percent else {
            return HoldingLimitStatus::Unrestricted;
        };
        if lifecycle.total_supply == 0 {
            return HoldingLimitStatus::Unrestricted;
        }

        let projected_percent =
            (current + proposed) / Decimal::from(lifecycle.total_supply) * Decimal::ONE_HUNDRED;

        if projected_percent > limit {
            HoldingLimitStatus::Exceeded {
                projected_percent,
                limit,
            }
        } else {
            HoldingLimitStatus::Within {
                projected_percent,
                limit,
            }
        }
    }

    pub fn is_exceeded(&self) -> bool {
        matches!(self, HoldingLimitStatus::Exceeded { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            HoldingLimitStatus::Unrestricted => "No holding limit configured".to_string(),
            HoldingLimitStatus::Within {
                projected_percent,
                limit,
            } => format!(
                "Projected holding {}% within limit {}%",
                projected_percent.round_dp(2).normalize(),
                limit.normalize()
            ),
            HoldingLimitStatus::Exceeded {
                projected_percent,
                limit,
            } => format!(
                "Projected holding {}% exceeds limit {}%",
                projected_percent.round_dp(2).normalize(),
                limit.normalize()
            ),
        }
    }
}
