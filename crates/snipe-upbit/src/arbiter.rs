//! Change-detection arbiter.
//!
//! Many proxies can observe the same feed change within milliseconds of
//! each other. The arbiter guarantees the body for a given ETag is parsed
//! exactly once across the whole pool: the first caller to present a new
//! ETag wins, everyone else silently adopts it.

use parking_lot::Mutex;

/// Tracks the last ETag whose body was handed to the parser.
#[derive(Default)]
pub struct ChangeArbiter {
    last_processed: Mutex<String>,
}

impl ChangeArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the caller is the first to see this ETag.
    ///
    /// Returns `true` exactly once per distinct ETag value; the winning
    /// caller parses the body, losers only update their proxy's cached
    /// ETag so they go back to receiving 304s.
    pub fn first_sighting(&self, etag: &str) -> bool {
        let mut last = self.last_processed.lock();
        if *last == etag {
            return false;
        }
        *last = etag.to_string();
        true
    }

    /// The last processed ETag (for diagnostics).
    pub fn last_processed(&self) -> String {
        self.last_processed.lock().clone()
    }
}
