//! Monitor configuration from the environment.
//!
//! - `UPBIT_PROXY_1..24`: SOCKS5 connect URLs (gaps allowed)
//! - `UPBIT_CHECK_INTERVAL_MS`: centre of the inter-tick sleep (default 300)
//! - `UPBIT_MONITOR_PAUSE_ENABLED`: "true" enables quiet hours
//! - `UPBIT_MONITOR_PAUSE_START` / `_PAUSE_END`: `HH:MM` in the monitor TZ
//! - `UPBIT_MONITOR_TZ`: IANA timezone id for the quiet-hours window

use crate::pool::ProxyEndpoint;
use chrono_tz::Tz;
use std::time::Duration;
use tracing::warn;

/// Announcement feed, newest-first, modest page size.
pub const FEED_URL: &str =
    "https://api-manager.upbit.com/api/v1/announcements?os=web&page=1&per_page=20&category=overall";

/// Maximum number of proxy slots scanned in the environment.
pub const MAX_PROXIES: usize = 24;

const DEFAULT_INTERVAL_MS: u64 = 300;
const DEFAULT_PAUSE_START: u32 = 13 * 60; // 13:00
const DEFAULT_PAUSE_END: u32 = 3 * 60; // 03:00
const DEFAULT_TZ: Tz = chrono_tz::Europe::Istanbul;

/// Quiet-hours window in minutes since midnight.
///
/// Overnight windows (start > end) wrap across midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseWindow {
    pub start_minutes: u32,
    pub end_minutes: u32,
}

impl PauseWindow {
    pub fn new(start_minutes: u32, end_minutes: u32) -> Self {
        Self {
            start_minutes,
            end_minutes,
        }
    }

    /// Whether the given minute-of-day falls inside the window.
    pub fn contains(&self, minute_of_day: u32) -> bool {
        if self.start_minutes > self.end_minutes {
            // Overnight, e.g. 13:00-03:00
            minute_of_day >= self.start_minutes || minute_of_day < self.end_minutes
        } else {
            minute_of_day >= self.start_minutes && minute_of_day < self.end_minutes
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub feed_url: String,
    pub proxies: Vec<ProxyEndpoint>,
    /// Centre of the inter-tick sleep; actual sleeps jitter around it.
    pub check_interval: Duration,
    pub pause_enabled: bool,
    pub pause_window: PauseWindow,
    pub timezone: Tz,
}

impl MonitorConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Self {
        let mut proxies = Vec::new();
        for slot in 1..=MAX_PROXIES {
            if let Ok(url) = std::env::var(format!("UPBIT_PROXY_{slot}")) {
                if !url.is_empty() {
                    proxies.push(ProxyEndpoint::labeled(proxies.len(), url));
                }
            }
        }

        let check_interval = std::env::var("UPBIT_CHECK_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_INTERVAL_MS));

        let pause_enabled = std::env::var("UPBIT_MONITOR_PAUSE_ENABLED")
            .map(|raw| raw == "true")
            .unwrap_or(false);

        let start_minutes = parse_time_to_minutes(
            std::env::var("UPBIT_MONITOR_PAUSE_START").ok().as_deref(),
            DEFAULT_PAUSE_START,
        );
        let end_minutes = parse_time_to_minutes(
            std::env::var("UPBIT_MONITOR_PAUSE_END").ok().as_deref(),
            DEFAULT_PAUSE_END,
        );

        let timezone = std::env::var("UPBIT_MONITOR_TZ")
            .ok()
            .map(|name| {
                name.parse().unwrap_or_else(|_| {
                    warn!(tz = %name, "Invalid timezone, using UTC");
                    chrono_tz::UTC
                })
            })
            .unwrap_or(DEFAULT_TZ);

        Self {
            feed_url: FEED_URL.to_string(),
            proxies,
            check_interval,
            pause_enabled,
            pause_window: PauseWindow::new(start_minutes, end_minutes),
            timezone,
        }
    }
}

/// Parse `HH:MM` into minutes since midnight, falling back on bad input.
pub fn parse_time_to_minutes(raw: Option<&str>, default_minutes: u32) -> u32 {
    let Some(raw) = raw else {
        return default_minutes;
    };
    let Some((hours, minutes)) = raw.split_once(':') else {
        warn!(value = raw, "Invalid HH:MM time, using default");
        return default_minutes;
    };

    match (hours.parse::<u32>(), minutes.parse::<u32>()) {
        (Ok(h), Ok(m)) if h <= 23 && m <= 59 && minutes.len() == 2 => h * 60 + m,
        _ => {
            warn!(value = raw, "Invalid HH:MM time, using default");
            default_minutes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_to_minutes() {
        assert_eq!(parse_time_to_minutes(Some("13:00"), 0), 780);
        assert_eq!(parse_time_to_minutes(Some("03:30"), 0), 210);
        assert_eq!(parse_time_to_minutes(Some("0:05"), 0), 5);
        assert_eq!(parse_time_to_minutes(None, 42), 42);
    }

    #[test]
    fn test_parse_time_rejects_malformed() {
        assert_eq!(parse_time_to_minutes(Some("25:00"), 42), 42);
        assert_eq!(parse_time_to_minutes(Some("12:60"), 42), 42);
        assert_eq!(parse_time_to_minutes(Some("noon"), 42), 42);
        assert_eq!(parse_time_to_minutes(Some("12:5"), 42), 42);
        assert_eq!(parse_time_to_minutes(Some(""), 42), 42);
    }

    #[test]
    fn test_same_day_window() {
        // 01:00-05:00
        let window = PauseWindow::new(60, 300);
        assert!(!window.contains(59));
        assert!(window.contains(60));
        assert!(window.contains(299));
        assert!(!window.contains(300));
        assert!(!window.contains(780));
    }

    #[test]
    fn test_overnight_window_wraps_midnight() {
        // 13:00-03:00: pauses at 13:00, resumes at 03:00 the next day
        let window = PauseWindow::new(780, 180);
        assert!(!window.contains(779));
        assert!(window.contains(780)); // 13:00 pause begins
        assert!(window.contains(1439)); // 23:59
        assert!(window.contains(0)); // midnight
        assert!(window.contains(179)); // 02:59
        assert!(!window.contains(180)); // 03:00 resumes
        assert!(!window.contains(600)); // 10:00
    }
}
