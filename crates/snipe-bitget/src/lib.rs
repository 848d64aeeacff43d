//! Bitget USDT-futures REST client.
//!
//! HMAC-SHA256-signed v2 API access, one client instance per user so
//! credentials never cross user boundaries. Covers exactly what the
//! sniper needs: price lookup, leverage set, balance fetch, market
//! orders, flash close, positions list, server time.

pub mod balance;
pub mod client;
pub mod error;
pub mod types;

pub use balance::BalanceCache;
pub use client::{BitgetClient, Credentials};
pub use error::{BitgetError, BitgetResult};
pub use types::{
    AccountBalance, ApiEnvelope, CloseResult, FuturesPosition, OrderReceipt, TickerData,
};
