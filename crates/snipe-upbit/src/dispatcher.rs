//! Listing event dispatcher.
//!
//! Takes a batch's candidate set and fires exactly one event per ticker
//! across the process lifetime. The detected set admits a ticker *before*
//! dispatch, closing the window in which two overlapping batches could
//! both fire, and `SymbolStore::save` happens-before the event is emitted
//! so a crash between the two never replays an order on restart.

use crate::error::MonitorResult;
use chrono::Utc;
use parking_lot::Mutex;
use snipe_core::{NewListing, Ticker};
use snipe_persistence::SymbolStore;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Deduplicating fan-in from feed batches to the listing event channel.
pub struct ListingDispatcher {
    store: Arc<SymbolStore>,
    detected: Mutex<HashSet<String>>,
    events: mpsc::Sender<NewListing>,
}

impl ListingDispatcher {
    /// Seed the detected set from the on-disk history so restarts do not
    /// re-fire old listings.
    pub fn new(store: Arc<SymbolStore>, events: mpsc::Sender<NewListing>) -> Self {
        let detected = store.symbols();
        Self {
            store,
            detected: Mutex::new(detected),
            events,
        }
    }

    /// Dispatch every genuinely new ticker from a batch candidate set.
    ///
    /// Returns the tickers that fired.
    pub fn dispatch(&self, candidates: Vec<Ticker>) -> MonitorResult<Vec<Ticker>> {
        let detected_at = Utc::now();
        let mut fired = Vec::new();

        for ticker in candidates {
            {
                let mut detected = self.detected.lock();
                if !detected.insert(ticker.as_str().to_string()) {
                    continue;
                }
            }

            self.store.save(ticker.as_str(), detected_at)?;

            info!(symbol = %ticker, "NEW LISTING DETECTED");
            let event = NewListing::new(ticker.clone(), detected_at);
            // try_send: the channel is sized for bursts and a slow
            // consumer must not stall the scheduler loop.
            if let Err(e) = self.events.try_send(event) {
                error!(symbol = %ticker, ?e, "Listing event channel full, event dropped");
            }
            fired.push(ticker);
        }

        Ok(fired)
    }

    /// Whether a ticker has already fired this lifetime (or a prior one).
    pub fn already_detected(&self, ticker: &Ticker) -> bool {
        self.detected.lock().contains(ticker.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ticker(s: &str) -> Ticker {
        Ticker::new(s).unwrap()
    }

    fn setup(dir: &TempDir) -> (ListingDispatcher, mpsc::Receiver<NewListing>) {
        let store = Arc::new(SymbolStore::open(dir.path().join("history.jsonl")).unwrap());
        let (tx, rx) = mpsc::channel(64);
        (ListingDispatcher::new(store, tx), rx)
    }

    #[tokio::test]
    async fn test_fires_once_per_ticker() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, mut rx) = setup(&dir);

        let fired = dispatcher.dispatch(vec![ticker("XYZ")]).unwrap();
        assert_eq!(fired.len(), 1);

        // Same candidate again: no event
        let fired = dispatcher.dispatch(vec![ticker("XYZ")]).unwrap();
        assert!(fired.is_empty());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.ticker.as_str(), "XYZ");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_batch_with_mixed_new_and_known() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, mut rx) = setup(&dir);

        dispatcher.dispatch(vec![ticker("AAA")]).unwrap();
        let fired = dispatcher.dispatch(vec![ticker("AAA"), ticker("BBB")]).unwrap();
        assert_eq!(fired, vec![ticker("BBB")]);

        assert_eq!(rx.recv().await.unwrap().ticker.as_str(), "AAA");
        assert_eq!(rx.recv().await.unwrap().ticker.as_str(), "BBB");
    }

    #[tokio::test]
    async fn test_restart_does_not_refire() {
        let dir = TempDir::new().unwrap();

        {
            let (dispatcher, _rx) = setup(&dir);
            dispatcher.dispatch(vec![ticker("XYZ")]).unwrap();
        }

        // New dispatcher over the same history file
        let (dispatcher, mut rx) = setup(&dir);
        assert!(dispatcher.already_detected(&ticker("XYZ")));
        let fired = dispatcher.dispatch(vec![ticker("XYZ")]).unwrap();
        assert!(fired.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
