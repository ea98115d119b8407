//! Process-wide token budget for the enrichment provider.
//!
//! One [`BudgetManager`] per process tracks a daily quota of enrichment
//! tokens. Admission is whole-batch: [`BudgetManager::reserve`] either
//! debits the full estimated cost atomically or rejects with the shortfall —
//! there is no partial consumption. The day boundary is checked lazily on
//! every operation against an injected [`Clock`] so rollover is testable
//! without waiting for midnight.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// Time source for the daily reset boundary. Injected so tests can move the
/// clock instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Point-in-time view of the budget. `used + remaining == limit` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetSnapshot {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    /// First day the counter will next read zero.
    pub resets_on: NaiveDate,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    /// The estimated cost exceeds what is left today. Nothing was consumed;
    /// the caller can shrink the batch and retry.
    #[error("batch requires {required} tokens but only {remaining} remain today")]
    Insufficient { required: u32, remaining: u32 },
}

#[derive(Debug)]
struct BudgetState {
    used: u32,
    day: NaiveDate,
}

/// Single-writer daily token budget.
///
/// All mutation happens under one mutex; the critical sections are a few
/// integer operations, so contention is not a concern at this call rate.
pub struct BudgetManager {
    limit: u32,
    cost_per_identifier: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<BudgetState>,
}

impl BudgetManager {
    #[must_use]
    pub fn new(limit: u32, cost_per_identifier: u32, clock: Arc<dyn Clock>) -> Self {
        let day = clock.now().date_naive();
        Self {
            limit,
            cost_per_identifier,
            clock,
            state: Mutex::new(BudgetState { used: 0, day }),
        }
    }

    /// Estimated token cost for a batch of `batch_size` identifiers.
    #[must_use]
    pub fn estimate(&self, batch_size: usize) -> u32 {
        let size = u32::try_from(batch_size).unwrap_or(u32::MAX);
        size.saturating_mul(self.cost_per_identifier)
    }

    /// Atomically reserves `cost` tokens or rejects the whole amount.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::Insufficient`] with the shortfall figures when
    /// `cost` exceeds today's remaining tokens; nothing is consumed.
    pub fn reserve(&self, cost: u32) -> Result<BudgetSnapshot, BudgetError> {
        let mut state = self.lock_state();
        self.rollover_if_needed(&mut state);

        let remaining = self.limit.saturating_sub(state.used);
        if cost > remaining {
            return Err(BudgetError::Insufficient {
                required: cost,
                remaining,
            });
        }

        state.used += cost;
        Ok(self.snapshot_locked(&state))
    }

    /// Returns tokens to the pool. Used when job creation fails after a
    /// successful reserve, so the counter stays truthful.
    pub fn refund(&self, cost: u32) {
        let mut state = self.lock_state();
        self.rollover_if_needed(&mut state);
        state.used = state.used.saturating_sub(cost);
    }

    /// Current budget figures, rolling the day over first if needed.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        let mut state = self.lock_state();
        self.rollover_if_needed(&mut state);
        self.snapshot_locked(&state)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BudgetState> {
        // A poisoned mutex means a panic mid-update of two integers; the
        // state itself is still consistent, so recover the guard.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn rollover_if_needed(&self, state: &mut BudgetState) {
        let today = self.clock.now().date_naive();
        if today != state.day {
            tracing::info!(
                previous_day = %state.day,
                used = state.used,
                "token budget day rolled over — resetting counter"
            );
            state.used = 0;
            state.day = today;
        }
    }

    fn snapshot_locked(&self, state: &BudgetState) -> BudgetSnapshot {
        BudgetSnapshot {
            limit: self.limit,
            used: state.used,
            remaining: self.limit.saturating_sub(state.used),
            resets_on: state.day.succ_opt().unwrap_or(state.day),
        }
    }
}
