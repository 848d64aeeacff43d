//! Application configuration.
//!
//! Everything is environment-driven (the deployment target is a plain
//! container with a `.env` file). Fatal misconfiguration - no proxies,
//! no encryption key - is rejected here, before any task spawns.

use crate::error::{AppError, AppResult};
use snipe_upbit::MonitorConfig;
use std::path::PathBuf;

/// Default data file locations, relative to the working directory.
const DEFAULT_USER_DB: &str = "bot_users.json";
const DEFAULT_SYMBOL_HISTORY: &str = "upbit_new.jsonl";
const DEFAULT_POSITIONS: &str = "active_positions.json";
const DEFAULT_ETAG_LOG: &str = "etag_news.jsonl";
const DEFAULT_TRADE_LOG: &str = "trade_execution_log.jsonl";

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    /// Raw key material for the credential cipher.
    pub encryption_key: String,
    pub user_db_path: PathBuf,
    pub symbol_history_path: PathBuf,
    pub positions_path: PathBuf,
    pub etag_log_path: PathBuf,
    pub trade_log_path: PathBuf,
}

impl AppConfig {
    /// Read the configuration from the environment and validate the
    /// fatal preconditions.
    pub fn from_env() -> AppResult<Self> {
        let monitor = MonitorConfig::from_env();
        if monitor.proxies.is_empty() {
            return Err(AppError::Config(
                "No proxies configured: set UPBIT_PROXY_1..24".to_string(),
            ));
        }

        let encryption_key = std::env::var("BOT_ENCRYPTION_KEY").unwrap_or_default();
        if encryption_key.is_empty() {
            return Err(AppError::Config(
                "BOT_ENCRYPTION_KEY is required for credential storage".to_string(),
            ));
        }

        Ok(Self {
            monitor,
            encryption_key,
            user_db_path: path_from_env("SNIPE_USER_DB", DEFAULT_USER_DB),
            symbol_history_path: path_from_env("SNIPE_SYMBOL_HISTORY", DEFAULT_SYMBOL_HISTORY),
            positions_path: path_from_env("SNIPE_POSITIONS", DEFAULT_POSITIONS),
            etag_log_path: path_from_env("SNIPE_ETAG_LOG", DEFAULT_ETAG_LOG),
            trade_log_path: path_from_env("SNIPE_TRADE_LOG", DEFAULT_TRADE_LOG),
        })
    }
}

fn path_from_env(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
