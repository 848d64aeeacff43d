//! Trade fan-out and position tracking.
//!
//! Consumes `NewListing` events: for every user passing the dispatch
//! gate, opens a leveraged long on the futures exchange with per-user
//! credential isolation, records the resulting position, and keeps the
//! user informed with periodic P&L reminders until close.

pub mod error;
pub mod exchange;
pub mod orchestrator;
pub mod tracker;

pub use error::{TradeError, TradeResult};
pub use exchange::{bitget_factory, Exchange, ExchangeFactory};
pub use orchestrator::TradeEngine;
pub use tracker::{remind_due, run_reminder_loop, PositionTracker, REMINDER_INTERVAL};
