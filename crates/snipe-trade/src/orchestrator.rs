//! Per-user trade orchestration.
//!
//! One listing event fans out into one task per active user. Inside a
//! task the critical path is: dispatch gate, cached balance pre-check,
//! leverage-set and price-lookup *in parallel* (they are independent
//! network calls and dominate detection-to-fill latency), size from the
//! user-requested leverage, market buy. A user's failure is reported to
//! that user and never aborts the other branches.

use crate::error::{TradeError, TradeResult};
use crate::exchange::ExchangeFactory;
use crate::tracker::PositionTracker;
use chrono::Utc;
use rust_decimal::Decimal;
use snipe_core::{NewListing, OpenPosition, OrderSide, Size, TradeSide};
use snipe_persistence::{EventLog, TradeExecutionRecord};
use snipe_registry::{DeliverySink, Notice, UserDirectory, UserRecord};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Balance safety buffer: an order needs margin x 1.02 available so fees
/// and price drift between check and fill cannot bounce it.
fn margin_buffer() -> Decimal {
    Decimal::new(102, 2)
}

/// Fans a new listing out to every active user.
pub struct TradeEngine {
    directory: Arc<dyn UserDirectory>,
    sink: Arc<dyn DeliverySink>,
    tracker: Arc<PositionTracker>,
    trade_log: Arc<EventLog>,
    make_client: ExchangeFactory,
}

impl TradeEngine {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sink: Arc<dyn DeliverySink>,
        tracker: Arc<PositionTracker>,
        trade_log: Arc<EventLog>,
        make_client: ExchangeFactory,
    ) -> Self {
        Self {
            directory,
            sink,
            tracker,
            trade_log,
            make_client,
        }
    }

    pub fn tracker(&self) -> &Arc<PositionTracker> {
        &self.tracker
    }

    /// Open longs for every active user, one independent task each, so a
    /// slow user cannot delay the others. Returns once all tasks finish.
    pub async fn fan_out(self: &Arc<Self>, listing: NewListing) {
        let users = self.directory.active_users();
        if users.is_empty() {
            warn!(symbol = %listing.ticker, "New listing but no active users");
            return;
        }

        info!(symbol = %listing.ticker, users = users.len(), "Fanning out auto-trades");

        let mut tasks = Vec::with_capacity(users.len());
        for user in users {
            let engine = Arc::clone(self);
            let listing = listing.clone();
            tasks.push(tokio::spawn(async move {
                engine.open_for_user(user, listing).await;
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!(?e, "Fan-out task panicked");
            }
        }
    }

    /// One user's branch: open, record, notify. Errors stop here.
    async fn open_for_user(&self, user: UserRecord, listing: NewListing) {
        let user_id = user.user_id;
        let symbol = listing.ticker.futures_symbol();

        match self.open_long(&user, &listing).await {
            Ok(position) => {
                let text = format!(
                    "Position opened: {} | entry {} | size {} | {}x | margin {} USDT",
                    position.symbol,
                    position.open_price,
                    position.size,
                    position.leverage,
                    position.margin_usdt,
                );
                self.sink
                    .deliver(user_id, Notice::with_close(text, position.symbol.clone()))
                    .await;
            }
            Err(e) => {
                warn!(user = user_id, symbol = %symbol, error = %e, "Auto-trade failed");
                self.sink
                    .deliver(user_id, Notice::text(format!("Auto-trade failed for {symbol}: {e}")))
                    .await;
            }
        }
    }

    /// Open a leveraged long for one user.
    pub async fn open_long(&self, user: &UserRecord, listing: &NewListing) -> TradeResult<OpenPosition> {
        let symbol = listing.ticker.futures_symbol();

        if !user.is_tradeable() {
            return Err(TradeError::UserNotTradeable(user.user_id));
        }

        let client = (self.make_client)(user)?;

        let required = user.margin_usdt * margin_buffer();
        if !client.has_sufficient_balance(required).await? {
            return Err(TradeError::InsufficientBalance { required });
        }

        // Leverage-set and price-lookup are independent; running them
        // serially would measurably slow the fill.
        let (leverage_result, price_result) = tokio::join!(
            client.set_leverage(&symbol, user.leverage),
            client.ticker_price(&symbol),
        );
        leverage_result?;
        let price = price_result?;

        let notional = user.margin_usdt * Decimal::from(user.leverage);
        let size = Size::from_notional(notional, price)
            .ok_or_else(|| TradeError::ZeroPrice(symbol.clone()))?;

        let order_sent_at = Utc::now();
        let receipt = client
            .place_market(&symbol, OrderSide::Buy, size, TradeSide::Open)
            .await?;
        let confirmed_at = Utc::now();

        let record = TradeExecutionRecord::new(
            listing.ticker.as_str(),
            user.user_id,
            listing.detected_at,
            order_sent_at,
            confirmed_at,
        );
        if let Err(e) = self.trade_log.append(&record) {
            warn!(?e, "Trade execution log write failed");
        }

        info!(
            user = user.user_id,
            symbol = %symbol,
            order = %receipt.order_id,
            price = %price,
            size = %size,
            latency_ms = record.detection_to_confirm_ms,
            "Position opened"
        );

        // The record carries the user-requested margin and leverage, not
        // any exchange-side adjustment, plus the price observed above.
        let position = OpenPosition {
            user_id: user.user_id,
            symbol,
            order_id: receipt.order_id,
            open_price: price,
            size,
            margin_usdt: user.margin_usdt,
            leverage: user.leverage,
            opened_at: confirmed_at,
            last_reminder: confirmed_at,
        };
        self.tracker.record(position.clone());

        Ok(position)
    }

    /// Flash-close one of a user's positions and notify.
    pub async fn close_position(&self, user_id: i64, symbol: &str) -> TradeResult<String> {
        let user = self
            .directory
            .user(user_id)
            .ok_or(TradeError::UserNotFound(user_id))?;
        let client = (self.make_client)(&user)?;

        let key = snipe_core::PositionKey::new(user_id, symbol);
        let order_id = crate::tracker::close_position(&self.tracker, client.as_ref(), &key).await?;

        self.sink
            .deliver(user_id, Notice::text(format!("{symbol} position closed (order {order_id})")))
            .await;
        Ok(order_id)
    }

    /// Close every position a user has open.
    pub async fn close_all(&self, user_id: i64) -> TradeResult<usize> {
        let user = self
            .directory
            .user(user_id)
            .ok_or(TradeError::UserNotFound(user_id))?;
        let client = (self.make_client)(&user)?;

        client.close_all().await?;
        let removed = self.tracker.remove_all_for_user(user_id);

        self.sink
            .deliver(user_id, Notice::text(format!("Closed {} position(s)", removed.len())))
            .await;
        Ok(removed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use snipe_bitget::OrderReceipt;
    use snipe_core::{HoldSide, Price, Ticker};
    use snipe_persistence::PositionStore;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct FakeExchange {
        calls: Mutex<Vec<String>>,
        sufficient_balance: bool,
        price: Decimal,
        call_delay: Duration,
        fail_leverage: bool,
        reported_pnl: Option<Decimal>,
    }

    impl FakeExchange {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                sufficient_balance: true,
                price: dec!(2),
                call_delay: Duration::ZERO,
                fail_leverage: false,
                reported_pnl: None,
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Exchange for FakeExchange {
        async fn has_sufficient_balance(&self, required: Decimal) -> TradeResult<bool> {
            self.record(format!("balance:{required}"));
            Ok(self.sufficient_balance)
        }

        async fn set_leverage(&self, symbol: &str, leverage: u32) -> TradeResult<()> {
            tokio::time::sleep(self.call_delay).await;
            self.record(format!("leverage:{symbol}:{leverage}"));
            if self.fail_leverage {
                return Err(TradeError::Exchange(snipe_bitget::BitgetError::Api {
                    code: "40019".to_string(),
                    message: "leverage rejected".to_string(),
                }));
            }
            Ok(())
        }

        async fn ticker_price(&self, symbol: &str) -> TradeResult<Price> {
            tokio::time::sleep(self.call_delay).await;
            self.record(format!("price:{symbol}"));
            Ok(Price::new(self.price))
        }

        async fn place_market(
            &self,
            symbol: &str,
            side: OrderSide,
            size: Size,
            trade_side: TradeSide,
        ) -> TradeResult<OrderReceipt> {
            self.record(format!("order:{symbol}:{side}:{}:{trade_side}", size.to_wire()));
            Ok(OrderReceipt {
                order_id: "order-123".to_string(),
                client_oid: None,
            })
        }

        async fn flash_close(&self, symbol: &str, hold_side: HoldSide) -> TradeResult<OrderReceipt> {
            self.record(format!("close:{symbol}:{hold_side}"));
            Ok(OrderReceipt {
                order_id: "close-1".to_string(),
                client_oid: None,
            })
        }

        async fn close_all(&self) -> TradeResult<()> {
            self.record("close_all");
            Ok(())
        }

        async fn unrealized_pnl(&self, symbol: &str) -> TradeResult<Option<Decimal>> {
            self.record(format!("pnl:{symbol}"));
            Ok(self.reported_pnl)
        }
    }

    struct RecordingSink {
        notices: Mutex<Vec<(i64, Notice)>>,
    }

    #[async_trait]
    impl DeliverySink for RecordingSink {
        async fn deliver(&self, user_id: i64, notice: Notice) {
            self.notices.lock().push((user_id, notice));
        }
    }

    struct StaticDirectory {
        users: Vec<UserRecord>,
    }

    impl UserDirectory for StaticDirectory {
        fn active_users(&self) -> Vec<UserRecord> {
            self.users.iter().filter(|u| u.active).cloned().collect()
        }

        fn user(&self, user_id: i64) -> Option<UserRecord> {
            self.users.iter().find(|u| u.user_id == user_id).cloned()
        }
    }

    fn make_user(id: i64) -> UserRecord {
        UserRecord {
            user_id: id,
            username: format!("user{id}"),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            api_passphrase: "pass".to_string(),
            margin_usdt: dec!(100),
            leverage: 10,
            active: true,
        }
    }

    fn listing(symbol: &str) -> NewListing {
        NewListing::new(Ticker::new(symbol).unwrap(), Utc::now())
    }

    struct Harness {
        engine: Arc<TradeEngine>,
        exchange: Arc<FakeExchange>,
        sink_notices: Arc<RecordingSink>,
        _dir: TempDir,
    }

    fn harness_with(users: Vec<UserRecord>, exchange: FakeExchange) -> Harness {
        let dir = TempDir::new().unwrap();
        let exchange = Arc::new(exchange);
        let sink = Arc::new(RecordingSink {
            notices: Mutex::new(Vec::new()),
        });
        let tracker = Arc::new(PositionTracker::load(PositionStore::new(
            dir.path().join("positions.json"),
        )));
        let trade_log = Arc::new(EventLog::new(dir.path().join("trades.jsonl")));

        let factory_exchange = Arc::clone(&exchange);
        let make_client: ExchangeFactory = Arc::new(move |_user| {
            Ok(Arc::clone(&factory_exchange) as Arc<dyn Exchange>)
        });

        let engine = Arc::new(TradeEngine::new(
            Arc::new(StaticDirectory { users }),
            Arc::clone(&sink) as Arc<dyn DeliverySink>,
            tracker,
            trade_log,
            make_client,
        ));

        Harness {
            engine,
            exchange,
            sink_notices: sink,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_happy_path_opens_position() {
        let harness = harness_with(vec![make_user(1)], FakeExchange::new());
        let user = make_user(1);

        let position = harness.engine.open_long(&user, &listing("XYZ")).await.unwrap();

        // size = margin * leverage / price = 100 * 10 / 2 = 500
        assert_eq!(position.symbol, "XYZUSDT");
        assert_eq!(position.size.inner(), dec!(500));
        assert_eq!(position.margin_usdt, dec!(100));
        assert_eq!(position.leverage, 10);
        assert_eq!(position.open_price, Price::new(dec!(2)));
        assert_eq!(position.order_id, "order-123");

        let calls = harness.exchange.calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("leverage:")).count(), 1);
        assert_eq!(calls.iter().filter(|c| c.starts_with("price:")).count(), 1);
        assert_eq!(calls.iter().filter(|c| c.starts_with("order:")).count(), 1);
        assert!(calls.contains(&"order:XYZUSDT:buy:500.00000000:open".to_string()));

        // Position recorded under (user, symbol)
        let key = snipe_core::PositionKey::new(1, "XYZUSDT");
        assert!(harness.engine.tracker().get(&key).is_some());
    }

    #[tokio::test]
    async fn test_balance_check_uses_buffer() {
        let harness = harness_with(vec![make_user(1)], FakeExchange::new());
        let user = make_user(1);
        harness.engine.open_long(&user, &listing("XYZ")).await.unwrap();

        // 100 USDT margin checked at x1.02
        assert!(harness.exchange.calls().contains(&"balance:102.00".to_string()));
    }

    #[tokio::test]
    async fn test_insufficient_balance_places_no_order() {
        let mut exchange = FakeExchange::new();
        exchange.sufficient_balance = false;
        let harness = harness_with(vec![make_user(1)], exchange);
        let user = make_user(1);

        let result = harness.engine.open_long(&user, &listing("XYZ")).await;
        assert!(matches!(result, Err(TradeError::InsufficientBalance { .. })));

        let calls = harness.exchange.calls();
        assert!(!calls.iter().any(|c| c.starts_with("order:")));
        assert!(!calls.iter().any(|c| c.starts_with("leverage:")));
    }

    #[tokio::test]
    async fn test_gate_rejects_without_any_calls() {
        let mut user = make_user(1);
        user.leverage = 500;
        let harness = harness_with(vec![user.clone()], FakeExchange::new());

        let result = harness.engine.open_long(&user, &listing("XYZ")).await;
        assert!(matches!(result, Err(TradeError::UserNotTradeable(1))));
        assert!(harness.exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn test_leverage_failure_aborts_before_order() {
        let mut exchange = FakeExchange::new();
        exchange.fail_leverage = true;
        let harness = harness_with(vec![make_user(1)], exchange);
        let user = make_user(1);

        let result = harness.engine.open_long(&user, &listing("XYZ")).await;
        assert!(result.is_err());
        assert!(!harness.exchange.calls().iter().any(|c| c.starts_with("order:")));
    }

    #[tokio::test]
    async fn test_leverage_and_price_run_in_parallel() {
        let mut exchange = FakeExchange::new();
        exchange.call_delay = Duration::from_millis(200);
        let harness = harness_with(vec![make_user(1)], exchange);
        let user = make_user(1);

        let started = Instant::now();
        harness.engine.open_long(&user, &listing("XYZ")).await.unwrap();
        let elapsed = started.elapsed();

        // Two 200ms calls serialized would take 400ms; joined they fit
        // well under 300ms.
        assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_fan_out_covers_all_users_and_isolates_failures() {
        let mut bad_user = make_user(2);
        bad_user.api_secret.clear(); // fails the gate
        let harness = harness_with(vec![make_user(1), bad_user, make_user(3)], FakeExchange::new());

        harness.engine.fan_out(listing("XYZ")).await;

        let calls = harness.exchange.calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("order:")).count(), 2);

        // Every user heard back, including the failed one
        let notices = harness.sink_notices.notices.lock();
        let notified: std::collections::HashSet<i64> = notices.iter().map(|(id, _)| *id).collect();
        assert_eq!(notified, [1, 2, 3].into_iter().collect());
    }

    #[tokio::test]
    async fn test_close_position_removes_record() {
        let harness = harness_with(vec![make_user(1)], FakeExchange::new());
        let user = make_user(1);
        harness.engine.open_long(&user, &listing("XYZ")).await.unwrap();

        let order_id = harness.engine.close_position(1, "XYZUSDT").await.unwrap();
        assert_eq!(order_id, "close-1");
        assert!(harness.engine.tracker().is_empty());
        assert!(harness.exchange.calls().contains(&"close:XYZUSDT:long".to_string()));
    }

    #[tokio::test]
    async fn test_close_all_clears_user_positions() {
        let harness = harness_with(vec![make_user(1)], FakeExchange::new());
        let user = make_user(1);
        harness.engine.open_long(&user, &listing("AAA")).await.unwrap();
        harness.engine.open_long(&user, &listing("BBB")).await.unwrap();

        let closed = harness.engine.close_all(1).await.unwrap();
        assert_eq!(closed, 2);
        assert!(harness.engine.tracker().is_empty());
    }

    // === Reminder pass ===

    struct ReminderSetup {
        tracker: PositionTracker,
        directory: StaticDirectory,
        sink: RecordingSink,
        exchange: Arc<FakeExchange>,
        factory: ExchangeFactory,
        _dir: TempDir,
    }

    fn reminder_setup(exchange: FakeExchange) -> ReminderSetup {
        let dir = TempDir::new().unwrap();
        let exchange = Arc::new(exchange);
        let factory_exchange = Arc::clone(&exchange);
        let factory: ExchangeFactory =
            Arc::new(move |_user| Ok(Arc::clone(&factory_exchange) as Arc<dyn crate::exchange::Exchange>));

        ReminderSetup {
            tracker: PositionTracker::load(PositionStore::new(dir.path().join("positions.json"))),
            directory: StaticDirectory {
                users: vec![make_user(1)],
            },
            sink: RecordingSink {
                notices: Mutex::new(Vec::new()),
            },
            exchange,
            factory,
            _dir: dir,
        }
    }

    fn stale_position(user_id: i64, symbol: &str) -> snipe_core::OpenPosition {
        let opened = Utc::now() - chrono::Duration::minutes(30);
        snipe_core::OpenPosition {
            user_id,
            symbol: symbol.to_string(),
            order_id: "order-1".to_string(),
            open_price: Price::new(dec!(2)),
            size: Size::new(dec!(500)),
            margin_usdt: dec!(100),
            leverage: 10,
            opened_at: opened,
            last_reminder: opened,
        }
    }

    #[tokio::test]
    async fn test_reminder_prefers_exchange_pnl() {
        let mut exchange = FakeExchange::new();
        exchange.reported_pnl = Some(dec!(41.66));
        let setup = reminder_setup(exchange);
        setup.tracker.record(stale_position(1, "XYZUSDT"));

        let now = Utc::now();
        crate::tracker::remind_due(&setup.tracker, &setup.directory, &setup.sink, &setup.factory, now)
            .await;

        let notices = setup.sink.notices.lock();
        assert_eq!(notices.len(), 1);
        let (user_id, notice) = &notices[0];
        assert_eq!(*user_id, 1);
        assert!(notice.text.contains("+41.66"));
        assert_eq!(notice.close_symbol.as_deref(), Some("XYZUSDT"));

        // Exchange-reported value used, price fallback never queried
        assert!(!setup.exchange.calls().iter().any(|c| c.starts_with("price:")));

        // Reminder clock advanced: a second pass stays quiet
        drop(notices);
        crate::tracker::remind_due(&setup.tracker, &setup.directory, &setup.sink, &setup.factory, now)
            .await;
        assert_eq!(setup.sink.notices.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_reminder_falls_back_to_unleveraged_price_delta() {
        let mut exchange = FakeExchange::new();
        exchange.price = dec!(2.10); // +0.10 on 500 units = +50, leverage untouched
        let setup = reminder_setup(exchange);
        setup.tracker.record(stale_position(1, "XYZUSDT"));

        crate::tracker::remind_due(&setup.tracker, &setup.directory, &setup.sink, &setup.factory, Utc::now())
            .await;

        let notices = setup.sink.notices.lock();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].1.text.contains("+50.00"));
        assert!(setup.exchange.calls().iter().any(|c| c.starts_with("price:")));
    }

    #[tokio::test]
    async fn test_reminder_skips_fresh_positions() {
        let setup = reminder_setup(FakeExchange::new());
        let mut position = stale_position(1, "XYZUSDT");
        position.last_reminder = Utc::now();
        setup.tracker.record(position);

        crate::tracker::remind_due(&setup.tracker, &setup.directory, &setup.sink, &setup.factory, Utc::now())
            .await;
        assert!(setup.sink.notices.lock().is_empty());
    }
}
