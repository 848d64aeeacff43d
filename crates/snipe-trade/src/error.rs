//! Trade error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("User {0} does not pass the dispatch gate")]
    UserNotTradeable(i64),

    #[error("Insufficient balance: {required} USDT required")]
    InsufficientBalance { required: rust_decimal::Decimal },

    #[error("Price is zero for {0}")]
    ZeroPrice(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] snipe_bitget::BitgetError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] snipe_persistence::PersistenceError),
}

pub type TradeResult<T> = Result<T, TradeError>;
