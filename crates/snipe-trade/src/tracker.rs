//! Active-position tracking.
//!
//! Thread-safe map keyed `(user, symbol)`, persisted to the positions
//! document on every mutation (write-behind so the order path never
//! waits on disk). The reminder loop refreshes live P&L every five
//! minutes and offers the one-click close.

use crate::error::{TradeError, TradeResult};
use crate::exchange::ExchangeFactory;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use snipe_core::{HoldSide, OpenPosition, PositionKey};
use snipe_persistence::PositionStore;
use snipe_registry::{DeliverySink, Notice, UserDirectory};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Reminder tick and per-position notification spacing.
pub const REMINDER_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// In-memory position map backed by the positions document.
pub struct PositionTracker {
    positions: RwLock<HashMap<PositionKey, OpenPosition>>,
    store: PositionStore,
}

impl PositionTracker {
    /// Load persisted positions at startup.
    pub fn load(store: PositionStore) -> Self {
        let positions = store.load();
        Self {
            positions: RwLock::new(positions),
            store,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &PositionKey) -> Option<OpenPosition> {
        self.positions.read().get(key).cloned()
    }

    pub fn snapshot(&self) -> Vec<OpenPosition> {
        self.positions.read().values().cloned().collect()
    }

    /// Record a freshly opened position. Replaces any stale record under
    /// the same key, keeping the at-most-one-per-(user, symbol) invariant.
    pub fn record(&self, position: OpenPosition) {
        {
            let mut positions = self.positions.write();
            positions.insert(position.key(), position);
        }
        self.persist_behind();
    }

    /// Remove a position after a confirmed close.
    pub fn remove(&self, key: &PositionKey) -> Option<OpenPosition> {
        let removed = self.positions.write().remove(key);
        if removed.is_some() {
            self.persist_behind();
        }
        removed
    }

    /// Remove every position belonging to a user (close-all).
    pub fn remove_all_for_user(&self, user_id: i64) -> Vec<OpenPosition> {
        let removed: Vec<OpenPosition> = {
            let mut positions = self.positions.write();
            let keys: Vec<PositionKey> = positions
                .keys()
                .filter(|key| key.user_id == user_id)
                .cloned()
                .collect();
            keys.iter().filter_map(|key| positions.remove(key)).collect()
        };
        if !removed.is_empty() {
            self.persist_behind();
        }
        removed
    }

    /// Positions whose last reminder is at least `spacing` old.
    pub fn due_for_reminder(&self, now: DateTime<Utc>, spacing: ChronoDuration) -> Vec<OpenPosition> {
        self.positions
            .read()
            .values()
            .filter(|position| now - position.last_reminder >= spacing)
            .cloned()
            .collect()
    }

    /// Advance a position's reminder clock.
    pub fn touch_reminder(&self, key: &PositionKey, at: DateTime<Utc>) {
        {
            let mut positions = self.positions.write();
            if let Some(position) = positions.get_mut(key) {
                position.last_reminder = at;
            }
        }
        self.persist_behind();
    }

    /// Synchronous persist, for shutdown and tests.
    pub fn persist_now(&self) -> TradeResult<()> {
        let snapshot = self.positions.read().clone();
        self.store.save(&snapshot)?;
        Ok(())
    }

    /// Write-behind persist: snapshot under the lock, write off-thread.
    fn persist_behind(&self) {
        let snapshot = self.positions.read().clone();
        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    if let Err(e) = store.save(&snapshot) {
                        warn!(?e, "Position persist failed");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = self.store.save(&snapshot) {
                    warn!(?e, "Position persist failed");
                }
            }
        }
    }
}

/// One reminder pass: fetch live P&L for every due position and deliver.
///
/// The exchange's reported unrealized P&L is preferred; when absent the
/// fallback is the unleveraged price-delta computation (the exchange
/// already reflects leverage in the unrealized value). Failures are
/// logged and that position's reminder is skipped until the next tick.
pub async fn remind_due(
    tracker: &PositionTracker,
    directory: &dyn UserDirectory,
    sink: &dyn DeliverySink,
    make_client: &ExchangeFactory,
    now: DateTime<Utc>,
) {
    let spacing = ChronoDuration::from_std(REMINDER_INTERVAL).expect("constant interval");

    for position in tracker.due_for_reminder(now, spacing) {
        let Some(user) = directory.user(position.user_id) else {
            warn!(user = position.user_id, "Reminder skipped: user gone from registry");
            continue;
        };

        let client = match make_client(&user) {
            Ok(client) => client,
            Err(e) => {
                warn!(user = user.user_id, ?e, "Reminder skipped: client build failed");
                continue;
            }
        };

        let pnl = match client.unrealized_pnl(&position.symbol).await {
            Ok(Some(pnl)) => pnl,
            _ => match client.ticker_price(&position.symbol).await {
                Ok(price) => position.price_delta_pnl(price),
                Err(e) => {
                    warn!(symbol = %position.symbol, ?e, "Reminder skipped: no live price");
                    continue;
                }
            },
        };

        let held_minutes = (now - position.opened_at).num_minutes();
        let text = format!(
            "{} position open for {}m | entry {} | size {} | {}x | P&L {:+.2} USDT",
            position.symbol, held_minutes, position.open_price, position.size, position.leverage, pnl
        );
        sink.deliver(position.user_id, Notice::with_close(text, position.symbol.clone()))
            .await;

        tracker.touch_reminder(&position.key(), now);
    }
}

/// Periodic reminder loop; ticks every five minutes forever.
pub async fn run_reminder_loop(
    tracker: Arc<PositionTracker>,
    directory: Arc<dyn UserDirectory>,
    sink: Arc<dyn DeliverySink>,
    make_client: ExchangeFactory,
) {
    info!(interval_secs = REMINDER_INTERVAL.as_secs(), "Position reminder loop starting");
    let mut interval = tokio::time::interval(REMINDER_INTERVAL);
    // The first tick fires immediately; skip it so freshly loaded
    // positions are not re-notified right at startup.
    interval.tick().await;

    loop {
        interval.tick().await;
        remind_due(&tracker, directory.as_ref(), sink.as_ref(), &make_client, Utc::now()).await;
    }
}

/// Flash-close one position and drop it from the tracker.
pub async fn close_position(
    tracker: &PositionTracker,
    client: &dyn crate::exchange::Exchange,
    key: &PositionKey,
) -> TradeResult<String> {
    let position = tracker
        .get(key)
        .ok_or_else(|| TradeError::PositionNotFound(key.to_string()))?;

    let receipt = client.flash_close(&position.symbol, HoldSide::Long).await?;
    tracker.remove(key);
    info!(key = %key, order = %receipt.order_id, "Position closed");
    Ok(receipt.order_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use snipe_core::{Price, Size};
    use tempfile::TempDir;

    fn make_position(user_id: i64, symbol: &str, last_reminder: DateTime<Utc>) -> OpenPosition {
        OpenPosition {
            user_id,
            symbol: symbol.to_string(),
            order_id: "order-1".to_string(),
            open_price: Price::new(dec!(2)),
            size: Size::new(dec!(500)),
            margin_usdt: dec!(100),
            leverage: 10,
            opened_at: last_reminder,
            last_reminder,
        }
    }

    fn tracker_in(dir: &TempDir) -> PositionTracker {
        PositionTracker::load(PositionStore::new(dir.path().join("positions.json")))
    }

    #[test]
    fn test_record_and_get() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir);
        let position = make_position(1, "XYZUSDT", Utc::now());

        tracker.record(position.clone());
        assert_eq!(tracker.get(&position.key()).unwrap(), position);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_at_most_one_position_per_user_symbol() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir);

        let first = make_position(1, "XYZUSDT", Utc::now());
        let mut second = first.clone();
        second.order_id = "order-2".to_string();

        tracker.record(first);
        tracker.record(second.clone());

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(&second.key()).unwrap().order_id, "order-2");
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let position = make_position(1, "XYZUSDT", Utc::now());

        {
            let tracker = tracker_in(&dir);
            tracker.record(position.clone());
            tracker.persist_now().unwrap();
        }

        let tracker = tracker_in(&dir);
        assert_eq!(tracker.get(&position.key()).unwrap(), position);
    }

    #[test]
    fn test_remove_all_for_user() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir);
        tracker.record(make_position(1, "AAAUSDT", Utc::now()));
        tracker.record(make_position(1, "BBBUSDT", Utc::now()));
        tracker.record(make_position(2, "AAAUSDT", Utc::now()));

        let removed = tracker.remove_all_for_user(1);
        assert_eq!(removed.len(), 2);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.get(&PositionKey::new(2, "AAAUSDT")).is_some());
    }

    #[test]
    fn test_due_for_reminder_spacing() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir);
        let now = Utc::now();

        tracker.record(make_position(1, "OLDUSDT", now - ChronoDuration::minutes(6)));
        tracker.record(make_position(1, "NEWUSDT", now - ChronoDuration::minutes(1)));

        let due = tracker.due_for_reminder(now, ChronoDuration::minutes(5));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].symbol, "OLDUSDT");
    }

    #[test]
    fn test_touch_reminder_advances_clock() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir);
        let now = Utc::now();
        let position = make_position(1, "XYZUSDT", now - ChronoDuration::minutes(10));
        tracker.record(position.clone());

        tracker.touch_reminder(&position.key(), now);
        assert!(tracker
            .due_for_reminder(now, ChronoDuration::minutes(5))
            .is_empty());
    }
}
