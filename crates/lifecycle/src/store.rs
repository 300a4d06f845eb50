//! Token lifecycle store
//!
//! Holdings for one token live behind that token's own mutex, so two
//! concurrent settlements touching the same token are linearized while
//! settlements on different tokens proceed independently. Reads copy a
//! snapshot out and release the lock immediately.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{LifecycleError, LifecycleResult};
use crate::status::{HoldingLimitStatus, LockStatus};
use crate::types::{InvestorHolding, TokenLifecycle, VestingType};

type HolderBook = Arc<Mutex<HashMap<String, Decimal>>>;

/// Registry of token lifecycles, holdings and allow-lists
#[derive(Default)]
pub struct LifecycleStore {
    tokens: RwLock<HashMap<String, Arc<TokenLifecycle>>>,
    holdings: DashMap<String, HolderBook>,
    allow_lists: RwLock<HashMap<String, HashSet<String>>>,
}

impl LifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a token's lifecycle
    pub fn register(&self, lifecycle: TokenLifecycle) -> LifecycleResult<()> {
        validate(&lifecycle)?;

        info!(
            token_id = %lifecycle.token_id,
            lockup_end = ?lifecycle.lockup_end_date,
            holding_limit = ?lifecycle.holding_limit_percent,
            "Token lifecycle registered"
        );

        self.tokens
            .write()
            .insert(lifecycle.token_id.clone(), Arc::new(lifecycle));
        Ok(())
    }

    pub fn get(&self, token_id: &str) -> Option<Arc<TokenLifecycle>> {
        self.tokens.read().get(token_id).cloned()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().len()
    }

    fn book(&self, token_id: &str) -> HolderBook {
        self.holdings
            .entry(token_id.to_string())
            .or_default()
            .clone()
    }

    /// Set a holder's absolute balance (settlement write path)
    pub fn update_holding(&self, token_id: &str, holder_id: &str, amount: Decimal) -> LifecycleResult<()> {
        if amount < Decimal::ZERO {
            return Err(LifecycleError::NegativeAmount(amount));
        }

        let book = self.book(token_id);
        let mut book = book.lock();
        if amount.is_zero() {
            book.remove(holder_id);
        } else {
            book.insert(holder_id.to_string(), amount);
        }

        debug!(token_id, holder_id, %amount, "Holding updated");
        Ok(())
    }

    /// Move `amount` between two holders as one linearized update
    pub fn apply_transfer(&self, token_id: &str, from: &str, to: &str, amount: Decimal) -> LifecycleResult<()> {
        if amount < Decimal::ZERO {
            return Err(LifecycleError::NegativeAmount(amount));
        }

        let book = self.book(token_id);
        let mut book = book.lock();

        let available = book.get(from).copied().unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(LifecycleError::InsufficientHolding {
                token_id: token_id.to_string(),
                holder_id: from.to_string(),
                available,
                required: amount,
            });
        }

        let remaining = available - amount;
        if remaining.is_zero() {
            book.remove(from);
        } else {
            book.insert(from.to_string(), remaining);
        }
        *book.entry(to.to_string()).or_insert(Decimal::ZERO) += amount;

        debug!(token_id, from, to, %amount, "Transfer settled");
        Ok(())
    }

    pub fn get_holding(&self, token_id: &str, holder_id: &str) -> Option<InvestorHolding> {
        let book = self.holdings.get(token_id)?.clone();
        let amount = book.lock().get(holder_id).copied()?;

        Some(InvestorHolding {
            token_id: token_id.to_string(),
            holder_id: holder_id.to_string(),
            amount,
        })
    }

    /// Current balance, zero when the holder has none
    pub fn holding_amount(&self, token_id: &str, holder_id: &str) -> Decimal {
        self.get_holding(token_id, holder_id)
            .map(|h| h.amount)
            .unwrap_or(Decimal::ZERO)
    }

    /// Derived share of supply; `None` if unknown token or no holding
    pub fn holding_percent(&self, token_id: &str, holder_id: &str) -> Option<Decimal> {
        let lifecycle = self.get(token_id)?;
        self.get_holding(token_id, holder_id)?
            .percent_of(lifecycle.total_supply)
    }

    pub fn lock_status(&self, token_id: &str, now: DateTime<Utc>) -> LockStatus {
        LockStatus::evaluate(self.get(token_id).as_deref(), now)
    }

    /// Concentration check for `holder_id` acquiring `proposed` more units
    pub fn holding_limit_status(&self, token_id: &str, holder_id: &str, proposed: Decimal) -> HoldingLimitStatus {
        let lifecycle = self.get(token_id);
        let current = self.holding_amount(token_id, holder_id);
        HoldingLimitStatus::evaluate(lifecycle.as_deref(), current, proposed)
    }

    /// Replace a token's allow-list
    pub fn set_allow_list<I, S>(&self, token_id: &str, holders: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let holders: HashSet<String> = holders.into_iter().map(Into::into).collect();
        self.allow_lists.write().insert(token_id.to_string(), holders);
    }

    pub fn add_to_allow_list(&self, token_id: &str, holder_id: &str) {
        self.allow_lists
            .write()
            .entry(token_id.to_string())
            .or_default()
            .insert(holder_id.to_string());
    }

    pub fn remove_from_allow_list(&self, token_id: &str, holder_id: &str) -> bool {
        self.allow_lists
            .write()
            .get_mut(token_id)
            .map(|list| list.remove(holder_id))
            .unwrap_or(false)
    }

    /// `None` when the token has no allow-list at all
    pub fn is_allowed(&self, token_id: &str, holder_id: &str) -> Option<bool> {
        self.allow_lists
            .read()
            .get(token_id)
            .map(|list| list.contains(holder_id))
    }
}

fn validate(lifecycle: &TokenLifecycle) -> LifecycleResult<()> {
    let invalid = |reason: &str| LifecycleError::InvalidLifecycle {
        token_id: lifecycle.token_id.clone(),
        reason: reason.to_string(),
    };

    if lifecycle.token_id.trim().is_empty() {
        return Err(invalid("token_id is empty"));
    }

    if let Some(limit) = lifecycle.holding_limit_percent {
        if limit <= Decimal::ZERO || limit > Decimal::ONE_HUNDRED {
            return Err(invalid("holding_limit_percent must be in (0, 100]"));
        }
        if lifecycle.total_supply == 0 {
            return Err(invalid("total_supply must be positive when a holding limit is set"));
        }
    }

    if lifecycle.vesting_type == Some(VestingType::Cliff) && lifecycle.cliff_date.is_none() {
        return Err(invalid("cliff vesting requires cliff_date"));
    }

    Ok(())
}
