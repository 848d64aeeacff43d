//! The scheduler loop driving the proxy pool.
//!
//! One supervising loop: gate on quiet hours, pick a random eligible
//! proxy, quiet it proactively, jitter, probe, interpret the outcome,
//! sleep a randomized inter-tick delay. Feed changes flow through the
//! filter into the dispatcher from inside the loop; order fan-out runs
//! on the event channel's consumer side and never blocks polling.

use crate::config::MonitorConfig;
use crate::dispatcher::ListingDispatcher;
use crate::error::{MonitorError, MonitorResult};
use crate::filter;
use crate::pool::{ProxyPool, PENALTY_COOLDOWN, PROACTIVE_COOLDOWN};
use crate::prober::{ProbeOutcome, Prober};
use chrono::{Timelike, Utc};
use rand::Rng;
use snipe_persistence::{EtagChangeRecord, EventLog};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Sleep bounds while no proxy is eligible.
const IDLE_SLEEP_MS: (u64, u64) = (250, 400);

/// Pre-request jitter bounds (human-like).
const PRE_REQUEST_JITTER_MS: (u64, u64) = (10, 50);

/// Quiet-hours sleep bounds.
const PAUSE_SLEEP_MS: (u64, u64) = (5_000, 10_000);

/// Probability and bounds of the occasional extended inter-tick pause.
const LONG_PAUSE_PROBABILITY: f32 = 0.10;
const LONG_PAUSE_MS: (u64, u64) = (500, 1_500);

/// Inter-tick sleep bounds around the configured interval centre
/// (250-400 ms at the default 300 ms).
fn base_sleep_range(interval_ms: u64) -> (u64, u64) {
    (interval_ms.saturating_sub(50).max(1), interval_ms + 100)
}

fn random_ms(range: (u64, u64)) -> Duration {
    let ms = rand::thread_rng().gen_range(range.0..=range.1);
    Duration::from_millis(ms)
}

/// The announcement-feed monitor.
pub struct Monitor {
    config: MonitorConfig,
    pool: ProxyPool,
    prober: Prober,
    dispatcher: ListingDispatcher,
    etag_log: Arc<EventLog>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        dispatcher: ListingDispatcher,
        etag_log: Arc<EventLog>,
    ) -> MonitorResult<Self> {
        if config.proxies.is_empty() {
            return Err(MonitorError::NoProxies);
        }

        let prober = Prober::new(config.feed_url.clone(), &config.proxies)?;
        let pool = ProxyPool::new(config.proxies.clone());

        Ok(Self {
            config,
            pool,
            prober,
            dispatcher,
            etag_log,
        })
    }

    /// Whether the current instant falls in the configured quiet window.
    pub fn in_quiet_hours(&self) -> bool {
        if !self.config.pause_enabled {
            return false;
        }
        let now = Utc::now().with_timezone(&self.config.timezone);
        let minute_of_day = now.hour() * 60 + now.minute();
        self.config.pause_window.contains(minute_of_day)
    }

    /// One-shot clock probe against the feed. Informational only.
    pub async fn server_time(&self) -> MonitorResult<chrono::DateTime<Utc>> {
        self.prober.server_time().await
    }

    /// Drive the poll loop forever.
    pub async fn run(self) -> MonitorResult<()> {
        info!(
            proxies = self.pool.len(),
            interval_ms = self.config.check_interval.as_millis() as u64,
            pause_enabled = self.config.pause_enabled,
            tz = %self.config.timezone,
            "Monitor starting: 3s proactive cooldown, 30s rate-limit penalty, uniform random rotation"
        );

        let mut paused = false;

        loop {
            if self.in_quiet_hours() {
                if !paused {
                    paused = true;
                    info!(tz = %self.config.timezone, "Pausing monitor for quiet hours");
                }
                sleep(random_ms(PAUSE_SLEEP_MS)).await;
                continue;
            }
            if paused {
                paused = false;
                info!("Resuming monitor after quiet hours");
            }

            let Some(index) = self.pool.pick_eligible() else {
                sleep(random_ms(IDLE_SLEEP_MS)).await;
                continue;
            };

            self.pool.apply_cooldown(index, PROACTIVE_COOLDOWN);
            sleep(random_ms(PRE_REQUEST_JITTER_MS)).await;

            match self.prober.probe(index).await {
                ProbeOutcome::Changed {
                    body,
                    etag,
                    previous_etag,
                    elapsed,
                } => {
                    info!(
                        proxy = %self.pool.endpoint(index).name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "First to detect feed change"
                    );
                    self.log_etag_change(index, &previous_etag, &etag, elapsed);
                    self.process_feed_body(&body);
                }
                ProbeOutcome::RateLimited => {
                    warn!(proxy = %self.pool.endpoint(index).name, "Rate limited (429), 30s penalty");
                    self.pool.apply_cooldown(index, PENALTY_COOLDOWN);
                }
                ProbeOutcome::Unchanged | ProbeOutcome::TransientError(_) => {}
            }

            let base = base_sleep_range(self.config.check_interval.as_millis() as u64);
            let long_pause = rand::thread_rng().gen::<f32>() < LONG_PAUSE_PROBABILITY;
            let delay = if long_pause {
                random_ms(LONG_PAUSE_MS)
            } else {
                random_ms(base)
            };
            sleep(delay).await;
        }
    }

    fn process_feed_body(&self, body: &str) {
        let candidates = match filter::parse_notices(body) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(?e, "Feed body decode failed");
                return;
            }
        };

        if let Err(e) = self.dispatcher.dispatch(candidates) {
            warn!(?e, "Listing dispatch failed");
        }
    }

    fn log_etag_change(&self, index: usize, old_etag: &str, new_etag: &str, elapsed: Duration) {
        let record = EtagChangeRecord::new(
            index + 1,
            self.pool.endpoint(index).name.clone(),
            old_etag,
            new_etag,
            elapsed.as_millis() as i64,
            Utc::now(),
        );
        if let Err(e) = self.etag_log.append(&record) {
            warn!(?e, "ETag change log write failed");
        }
    }
}
