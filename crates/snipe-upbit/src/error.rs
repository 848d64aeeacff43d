//! Monitor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("No proxies configured")]
    NoProxies,

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Feed decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Missing Date header in response")]
    MissingDateHeader,

    #[error("Unparsable Date header: {0}")]
    BadDateHeader(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] snipe_persistence::PersistenceError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
