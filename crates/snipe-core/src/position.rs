//! Open-position records and the new-listing event.

use crate::decimal::{Price, Size};
use crate::ticker::Ticker;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key for the active-position map: one position per `(user, symbol)`.
///
/// Serialized into the positions document as `"{user_id}_{symbol}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub user_id: i64,
    pub symbol: String,
}

impl PositionKey {
    pub fn new(user_id: i64, symbol: impl Into<String>) -> Self {
        Self {
            user_id,
            symbol: symbol.into(),
        }
    }

    /// Document-key form used in the persisted positions file.
    pub fn document_key(&self) -> String {
        format!("{}_{}", self.user_id, self.symbol)
    }

    /// Parse a document key back into its parts.
    pub fn parse(key: &str) -> Option<Self> {
        let (user_id, symbol) = key.split_once('_')?;
        let user_id = user_id.parse().ok()?;
        if symbol.is_empty() {
            return None;
        }
        Some(Self::new(user_id, symbol))
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document_key())
    }
}

/// An open futures position, created when an order placement succeeds.
///
/// `margin` and `leverage` are the values the user requested, not any
/// exchange-side adjustment. `last_reminder` advances on each P&L
/// notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub user_id: i64,
    pub symbol: String,
    pub order_id: String,
    pub open_price: Price,
    pub size: Size,
    pub margin_usdt: Decimal,
    pub leverage: u32,
    pub opened_at: DateTime<Utc>,
    pub last_reminder: DateTime<Utc>,
}

impl OpenPosition {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.user_id, self.symbol.clone())
    }

    /// Price-delta P&L in quote currency, without leverage multiplication.
    ///
    /// Fallback only; the exchange's reported unrealized P&L already
    /// reflects leverage and is preferred when available.
    pub fn price_delta_pnl(&self, current: Price) -> Decimal {
        (current.inner() - self.open_price.inner()) * self.size.inner()
    }
}

/// Event emitted by the dispatcher when a fresh symbol is detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub ticker: Ticker,
    pub detected_at: DateTime<Utc>,
}

impl NewListing {
    pub fn new(ticker: Ticker, detected_at: DateTime<Utc>) -> Self {
        Self {
            ticker,
            detected_at,
        }
    }
}
