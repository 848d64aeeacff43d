//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(#[from] snipe_registry::RegistryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] snipe_persistence::PersistenceError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] snipe_upbit::MonitorError),

    #[error("Trade error: {0}")]
    Trade(#[from] snipe_trade::TradeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
