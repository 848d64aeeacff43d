//! Listing sniper application.
//!
//! Wires the announcement monitor to the trade fan-out:
//! monitor loop -> listing events -> per-user orders -> position tracker,
//! with the reminder loop and the startup clock-sync report alongside.

pub mod app;
pub mod clock;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
