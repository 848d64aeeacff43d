//! Append-only operational event logs.
//!
//! Two record kinds share one JSONL writer:
//! - `EtagChangeRecord`: which proxy saw a feed change first, and how fast
//! - `TradeExecutionRecord`: detection-to-order latency per placed order
//!
//! These files are the evidence trail for the latency the system exists
//! to optimize; nothing reads them back at runtime.

use crate::error::PersistenceResult;
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Seoul;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A first-sighting of a new feed ETag.
#[derive(Debug, Clone, Serialize)]
pub struct EtagChangeRecord {
    pub proxy_index: usize,
    pub proxy_name: String,
    pub detected_at: String,
    pub server_time: String,
    pub old_etag: String,
    pub new_etag: String,
    pub response_time_ms: i64,
}

impl EtagChangeRecord {
    pub fn new(
        proxy_index: usize,
        proxy_name: impl Into<String>,
        old_etag: impl Into<String>,
        new_etag: impl Into<String>,
        response_time_ms: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            proxy_index,
            proxy_name: proxy_name.into(),
            detected_at: at
                .with_timezone(&Seoul)
                .format("%Y-%m-%d %H:%M:%S%.3f KST")
                .to_string(),
            server_time: at.to_rfc3339(),
            old_etag: old_etag.into(),
            new_etag: new_etag.into(),
            response_time_ms,
        }
    }
}

/// One placed order with its detection-to-confirmation timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TradeExecutionRecord {
    pub ticker: String,
    pub user_id: i64,
    pub detected_at: String,
    pub order_sent_at: String,
    pub order_confirmed_at: String,
    pub detection_to_confirm_ms: i64,
}

impl TradeExecutionRecord {
    pub fn new(
        ticker: impl Into<String>,
        user_id: i64,
        detected_at: DateTime<Utc>,
        order_sent_at: DateTime<Utc>,
        order_confirmed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            user_id,
            detected_at: detected_at.to_rfc3339(),
            order_sent_at: order_sent_at.to_rfc3339(),
            order_confirmed_at: order_confirmed_at.to_rfc3339(),
            detection_to_confirm_ms: (order_confirmed_at - detected_at).num_milliseconds(),
        }
    }
}

/// Append-mode JSONL writer for operational events.
pub struct EventLog {
    path: PathBuf,
    // Serializes appends so concurrent tasks never interleave lines.
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Append one record as a JSON line and flush.
    pub fn append<T: Serialize>(&self, record: &T) -> PersistenceResult<()> {
        let json = serde_json::to_string(record)?;

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    #[test]
    fn test_append_accumulates_lines() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("etag.jsonl"));

        for i in 0..3 {
            let record = EtagChangeRecord::new(
                i,
                format!("Proxy #{}", i + 1),
                "old",
                format!("etag-{i}"),
                42,
                Utc::now(),
            );
            log.append(&record).unwrap();
        }

        let file = std::fs::File::open(dir.path().join("etag.jsonl")).unwrap();
        let lines: Vec<String> = BufReader::new(file).lines().filter_map(|l| l.ok()).collect();
        assert_eq!(lines.len(), 3);

        let parsed: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();
        assert_eq!(parsed["new_etag"], "etag-2");
        assert_eq!(parsed["proxy_name"], "Proxy #3");
    }

    #[test]
    fn test_trade_record_latency_math() {
        let detected = "2025-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let sent = "2025-03-01T00:00:00.150Z".parse::<DateTime<Utc>>().unwrap();
        let confirmed = "2025-03-01T00:00:00.420Z".parse::<DateTime<Utc>>().unwrap();

        let record = TradeExecutionRecord::new("XYZ", 42, detected, sent, confirmed);
        assert_eq!(record.detection_to_confirm_ms, 420);
    }
}
