//! Per-client balance cache.
//!
//! The order path pre-validates available balance; hitting the accounts
//! endpoint on every order would add a full round-trip to the critical
//! path, so the last fetched value is reused inside a short freshness
//! window and invalidated whenever an order mutates the account.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};

/// How long a fetched balance may gate an order.
pub const BALANCE_FRESHNESS: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct CacheState {
    available: Decimal,
    last_refresh: Option<Instant>,
    stale: bool,
}

/// Cached available-USDT balance.
#[derive(Debug, Default)]
pub struct BalanceCache {
    state: RwLock<CacheState>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value, if it is still inside the freshness window and
    /// not explicitly invalidated.
    pub fn fresh_available(&self, freshness: Duration) -> Option<Decimal> {
        let state = self.state.read();
        if state.stale {
            return None;
        }
        let last_refresh = state.last_refresh?;
        if last_refresh.elapsed() < freshness {
            Some(state.available)
        } else {
            None
        }
    }

    /// Store a freshly fetched value.
    pub fn update(&self, available: Decimal) {
        let mut state = self.state.write();
        state.available = available;
        state.last_refresh = Some(Instant::now());
        state.stale = false;
    }

    /// Force the next read to refresh (an order changed the account).
    pub fn invalidate(&self) {
        self.state.write().stale = true;
    }
}
