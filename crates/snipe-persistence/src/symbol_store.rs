//! Append-only detected-symbol history.
//!
//! One JSON object per line: `{symbol, timestamp, detected_at}`. The
//! in-memory set is rebuilt from the file at startup so a restart never
//! re-fires a listing that was already traded.

use crate::error::PersistenceResult;
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Seoul;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One line of the history file.
///
/// `timestamp` is the RFC3339 instant, `detected_at` a human-readable
/// KST string; both reflect Korea time since that is where the feed lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolHistoryEntry {
    pub symbol: String,
    pub timestamp: String,
    pub detected_at: String,
}

impl SymbolHistoryEntry {
    fn new(symbol: &str, instant: DateTime<Utc>) -> Self {
        let kst = instant.with_timezone(&Seoul);
        Self {
            symbol: symbol.to_string(),
            timestamp: kst.to_rfc3339(),
            detected_at: kst.format("%Y-%m-%d %H:%M:%S KST").to_string(),
        }
    }
}

/// JSONL-backed symbol history with an in-memory dedupe set.
pub struct SymbolStore {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
}

impl SymbolStore {
    /// Open the store and rebuild the in-memory set from disk.
    ///
    /// Unparsable lines (including a torn final line after a crash) are
    /// skipped with a warning.
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut seen = HashSet::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<SymbolHistoryEntry>(trimmed) {
                    Ok(entry) => {
                        seen.insert(entry.symbol);
                    }
                    Err(e) => warn!(?e, "Skipping unparsable history line"),
                }
            }
            info!(symbols = seen.len(), path = %path.display(), "Loaded symbol history");
        }

        Ok(Self {
            path,
            seen: Mutex::new(seen),
        })
    }

    /// Whether a symbol was already detected in this process or a prior one.
    pub fn contains(&self, symbol: &str) -> bool {
        self.seen.lock().contains(symbol)
    }

    /// All known symbols.
    pub fn symbols(&self) -> HashSet<String> {
        self.seen.lock().clone()
    }

    /// Record a detection. Idempotent: a symbol already in the set is a
    /// no-op, so the file never carries duplicates.
    ///
    /// The append-then-insert order is the durability boundary: the line
    /// is flushed before the in-memory set admits the symbol.
    pub fn save(&self, symbol: &str, detected_at: DateTime<Utc>) -> PersistenceResult<()> {
        let mut seen = self.seen.lock();
        if seen.contains(symbol) {
            return Ok(());
        }

        let entry = SymbolHistoryEntry::new(symbol, detected_at);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(&entry)?;
        writeln!(file, "{json}")?;
        file.flush()?;

        seen.insert(symbol.to_string());
        Ok(())
    }
}
