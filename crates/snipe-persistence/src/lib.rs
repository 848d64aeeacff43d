//! Data persistence for the listing sniper.
//!
//! Two formats, chosen for their failure modes:
//! - JSON Lines for append-only history and event logs. Each line is a
//!   complete JSON object, so a crash mid-write corrupts at most one line
//!   and reload simply skips it.
//! - A single pretty-printed JSON document for the active-position map,
//!   rewritten whole on every mutation.

pub mod error;
pub mod event_log;
pub mod position_store;
pub mod symbol_store;

pub use error::{PersistenceError, PersistenceResult};
pub use event_log::{EtagChangeRecord, EventLog, TradeExecutionRecord};
pub use position_store::PositionStore;
pub use symbol_store::{SymbolHistoryEntry, SymbolStore};
