//! Exchange client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BitgetError {
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Response decode failed: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty data in response: {0}")]
    EmptyData(String),

    #[error("Flash close failed: {0}")]
    FlashClose(String),

    #[error("USDT account not found in balances")]
    UsdtAccountMissing,

    #[error("Balance refresh timed out")]
    BalanceTimeout,
}

impl BitgetError {
    /// Whether a retry can help: transport failures and explicit rate
    /// limits only. Signature, validation and decode errors never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::RateLimited(_))
    }
}

pub type BitgetResult<T> = Result<T, BitgetError>;
