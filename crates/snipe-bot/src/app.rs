//! Application wiring.
//!
//! Startup order matters: fatal config checks already happened in
//! `AppConfig::from_env`, then stores load (positions and symbol history
//! must be in memory before the first probe can fire an event), then the
//! long-lived loops spawn. The listing event channel is the only coupling
//! between the monitor and the trade fan-out.

use crate::clock::ClockProbe;
use crate::config::AppConfig;
use crate::error::AppResult;
use snipe_bitget::{BitgetClient, Credentials};
use snipe_core::NewListing;
use snipe_persistence::{EventLog, PositionStore, SymbolStore};
use snipe_registry::{CredentialCipher, DeliverySink, LogSink, UserStore};
use snipe_trade::{bitget_factory, run_reminder_loop, PositionTracker, TradeEngine};
use snipe_upbit::{ListingDispatcher, Monitor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Buffered listing events between monitor and fan-out. Listings arrive
/// one or two at a time; the headroom only covers pathological batches.
const LISTING_CHANNEL_CAPACITY: usize = 64;

/// The assembled application.
pub struct Application {
    config: AppConfig,
    engine: Arc<TradeEngine>,
    tracker: Arc<PositionTracker>,
    directory: Arc<UserStore>,
    sink: Arc<dyn DeliverySink>,
    monitor: Monitor,
    listing_rx: mpsc::Receiver<NewListing>,
}

impl Application {
    /// Assemble every component. No tasks run yet.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let cipher = CredentialCipher::from_key_material(&config.encryption_key)?;
        let directory = Arc::new(UserStore::open(&config.user_db_path, cipher)?);

        let tracker = Arc::new(PositionTracker::load(PositionStore::new(
            &config.positions_path,
        )));

        let symbol_store = Arc::new(SymbolStore::open(&config.symbol_history_path)?);
        let (listing_tx, listing_rx) = mpsc::channel(LISTING_CHANNEL_CAPACITY);
        let dispatcher = ListingDispatcher::new(symbol_store, listing_tx);

        let etag_log = Arc::new(EventLog::new(&config.etag_log_path));
        let monitor = Monitor::new(config.monitor.clone(), dispatcher, etag_log)?;

        let sink: Arc<dyn DeliverySink> = Arc::new(LogSink);
        let trade_log = Arc::new(EventLog::new(&config.trade_log_path));
        let engine = Arc::new(TradeEngine::new(
            directory.clone(),
            sink.clone(),
            tracker.clone(),
            trade_log,
            bitget_factory(),
        ));

        Ok(Self {
            config,
            engine,
            tracker,
            directory,
            sink,
            monitor,
            listing_rx,
        })
    }

    /// One-shot clock-sync probes against both exchanges. Failures are
    /// reported and ignored; the probes are informational.
    pub async fn report_clock_sync(&self) {
        match ClockProbe::measure("upbit", || self.monitor.server_time()).await {
            Ok(probe) => probe.report(),
            Err(e) => error!(exchange = "upbit", %e, "Clock probe failed"),
        }

        // Server time needs no real credentials.
        let client = BitgetClient::new(Credentials {
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: String::new(),
        });
        match client {
            Ok(client) => match ClockProbe::measure("bitget", || client.server_time()).await {
                Ok(probe) => probe.report(),
                Err(e) => error!(exchange = "bitget", %e, "Clock probe failed"),
            },
            Err(e) => error!(exchange = "bitget", %e, "Clock probe client build failed"),
        }
    }

    /// Run until interrupted: monitor loop, reminder loop, fan-out
    /// consumer. Ctrl-C triggers a final position persist and exit.
    pub async fn run(self) -> AppResult<()> {
        let Self {
            config,
            engine,
            tracker,
            directory,
            sink,
            monitor,
            mut listing_rx,
        } = self;

        info!(
            users = directory.len(),
            positions = tracker.len(),
            proxies = config.monitor.proxies.len(),
            "Starting listing sniper"
        );

        let monitor_handle = tokio::spawn(async move {
            if let Err(e) = monitor.run().await {
                error!(?e, "Monitor loop exited");
            }
        });

        let reminder_handle = tokio::spawn(run_reminder_loop(
            tracker.clone(),
            directory.clone(),
            sink,
            bitget_factory(),
        ));

        let fanout_handle = tokio::spawn(async move {
            while let Some(listing) = listing_rx.recv().await {
                engine.fan_out(listing).await;
            }
        });

        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested");

        monitor_handle.abort();
        reminder_handle.abort();
        fanout_handle.abort();

        tracker.persist_now()?;
        info!("Positions persisted, bye");
        Ok(())
    }
}
