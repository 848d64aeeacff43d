//! Core domain types for the listing sniper.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Ticker`: validated base-asset token detected on the announcement feed
//! - `Price`, `Size`: precision-safe numeric types
//! - `OrderSide`, `TradeSide`, `HoldSide`: exchange order enums
//! - `OpenPosition`, `PositionKey`: the persisted position record and its key
//! - `NewListing`: the event emitted when a fresh symbol is detected

pub mod decimal;
pub mod error;
pub mod order;
pub mod position;
pub mod ticker;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{HoldSide, OrderSide, TradeSide};
pub use position::{NewListing, OpenPosition, PositionKey};
pub use ticker::{Ticker, QUOTE_SUFFIX};
