//! Validated base-asset tokens.
//!
//! A `Ticker` is the short uppercase-alphanumeric symbol extracted from an
//! announcement title (e.g. `XYZ`). The futures market trades the
//! USDT-quoted contract, so `futures_symbol()` appends the quote suffix.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quote-currency suffix for the traded futures contract.
pub const QUOTE_SUFFIX: &str = "USDT";

/// Quote-market labels that must never be treated as tickers.
const QUOTE_LABELS: [&str; 3] = ["KRW", "BTC", "USDT"];

/// A base-asset token detected on the announcement feed.
///
/// Invariant: 1-10 characters, all in `[A-Z0-9]`, and not one of the
/// quote-market labels (`KRW`, `BTC`, `USDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Validate and construct a ticker.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() || token.len() > 10 {
            return Err(CoreError::InvalidTicker(token));
        }
        if !token.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(CoreError::InvalidTicker(token));
        }
        if QUOTE_LABELS.contains(&token.as_str()) {
            return Err(CoreError::InvalidTicker(token));
        }
        Ok(Self(token))
    }

    /// The bare base-asset token.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The USDT-quoted futures contract symbol (`ETH` -> `ETHUSDT`).
    pub fn futures_symbol(&self) -> String {
        format!("{}{}", self.0, QUOTE_SUFFIX)
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ticker {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tickers() {
        assert_eq!(Ticker::new("XYZ").unwrap().as_str(), "XYZ");
        assert_eq!(Ticker::new("A").unwrap().as_str(), "A");
        assert_eq!(Ticker::new("1INCH").unwrap().as_str(), "1INCH");
        assert_eq!(Ticker::new("ABCDEFGHIJ").unwrap().as_str(), "ABCDEFGHIJ");
    }

    #[test]
    fn test_rejects_quote_labels() {
        assert!(Ticker::new("KRW").is_err());
        assert!(Ticker::new("BTC").is_err());
        assert!(Ticker::new("USDT").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Ticker::new("").is_err());
        assert!(Ticker::new("ABCDEFGHIJK").is_err()); // 11 chars
        assert!(Ticker::new("abc").is_err());
        assert!(Ticker::new("X Y").is_err());
        assert!(Ticker::new("마켓").is_err());
    }

    #[test]
    fn test_futures_symbol() {
        assert_eq!(Ticker::new("ETH").unwrap().futures_symbol(), "ETHUSDT");
        assert_eq!(Ticker::new("XYZ").unwrap().futures_symbol(), "XYZUSDT");
    }
}
