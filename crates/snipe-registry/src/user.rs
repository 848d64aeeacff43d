//! User records and the dispatch gate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Leverage bounds accepted by the futures exchange.
pub const MIN_LEVERAGE: u32 = 1;
pub const MAX_LEVERAGE: u32 = 125;

/// A subscribed user, as the trading core consumes it.
///
/// Credentials arrive decrypted; the store handles at-rest encryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
    pub margin_usdt: Decimal,
    pub leverage: u32,
    pub active: bool,
}

impl UserRecord {
    /// Whether all three API credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty() && !self.api_passphrase.is_empty()
    }

    /// The dispatch gate: a user participates in fan-out iff active,
    /// fully credentialed, positive margin, and leverage in [1, 125].
    pub fn is_tradeable(&self) -> bool {
        self.active
            && self.has_credentials()
            && self.margin_usdt > Decimal::ZERO
            && (MIN_LEVERAGE..=MAX_LEVERAGE).contains(&self.leverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tradeable_user() -> UserRecord {
        UserRecord {
            user_id: 42,
            username: "trader".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            api_passphrase: "pass".to_string(),
            margin_usdt: dec!(100),
            leverage: 10,
            active: true,
        }
    }

    #[test]
    fn test_gate_accepts_valid_user() {
        assert!(tradeable_user().is_tradeable());
    }

    #[test]
    fn test_gate_rejects_inactive() {
        let mut user = tradeable_user();
        user.active = false;
        assert!(!user.is_tradeable());
    }

    #[test]
    fn test_gate_rejects_missing_credentials() {
        for field in 0..3 {
            let mut user = tradeable_user();
            match field {
                0 => user.api_key.clear(),
                1 => user.api_secret.clear(),
                _ => user.api_passphrase.clear(),
            }
            assert!(!user.is_tradeable());
        }
    }

    #[test]
    fn test_gate_rejects_bad_margin() {
        let mut user = tradeable_user();
        user.margin_usdt = Decimal::ZERO;
        assert!(!user.is_tradeable());
        user.margin_usdt = dec!(-5);
        assert!(!user.is_tradeable());
    }

    #[test]
    fn test_gate_leverage_bounds() {
        let mut user = tradeable_user();
        user.leverage = 0;
        assert!(!user.is_tradeable());
        user.leverage = 1;
        assert!(user.is_tradeable());
        user.leverage = 125;
        assert!(user.is_tradeable());
        user.leverage = 126;
        assert!(!user.is_tradeable());
    }
}
