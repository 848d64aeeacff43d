//! Startup clock-sync report.
//!
//! One-shot measurement of server vs. local clock skew for both
//! exchanges: bracket the request with local timestamps, estimate the
//! network latency as half the round trip, and compare the adjusted
//! server time against local. Informational only - nothing corrects for
//! the offset - but a skewed clock breaks signed-request timestamps, so
//! the operator wants to know at startup.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Offset above which the report escalates to a warning.
const OFFSET_WARN_THRESHOLD_MS: i64 = 1_000;

/// Result of one clock probe.
#[derive(Debug, Clone)]
pub struct ClockProbe {
    pub exchange: &'static str,
    pub server_time: DateTime<Utc>,
    pub local_time: DateTime<Utc>,
    pub network_latency: Duration,
    pub clock_offset: Duration,
}

impl ClockProbe {
    /// Bracket a server-time fetch and compute latency and offset.
    pub async fn measure<F, Fut, E>(exchange: &'static str, fetch: F) -> Result<Self, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<DateTime<Utc>, E>>,
    {
        let before = Utc::now();
        let server_raw = fetch().await?;
        let after = Utc::now();

        let network_latency = (after - before) / 2;
        let adjusted_server = server_raw + network_latency;
        let clock_offset = adjusted_server - after;

        Ok(Self {
            exchange,
            server_time: adjusted_server,
            local_time: after,
            network_latency,
            clock_offset,
        })
    }

    /// Log the probe, warning when the offset exceeds one second.
    pub fn report(&self) {
        let offset_ms = self.clock_offset.num_milliseconds();
        if offset_ms.abs() > OFFSET_WARN_THRESHOLD_MS {
            warn!(
                exchange = self.exchange,
                offset_ms,
                latency_ms = self.network_latency.num_milliseconds(),
                "Clock offset exceeds 1s - local clock may be skewed"
            );
        } else {
            info!(
                exchange = self.exchange,
                offset_ms,
                latency_ms = self.network_latency.num_milliseconds(),
                "Clock sync OK"
            );
        }
    }
}
