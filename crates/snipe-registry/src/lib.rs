//! User registry for the listing sniper.
//!
//! The chat front-end owns onboarding; this crate owns what the trading
//! core consumes from it:
//! - `UserRecord` snapshots with the dispatch gate
//! - the `UserDirectory` / `DeliverySink` seams
//! - the encrypted-at-rest JSON user store backing the directory

pub mod crypto;
pub mod error;
pub mod store;
pub mod user;

pub use crypto::CredentialCipher;
pub use error::{RegistryError, RegistryResult};
pub use store::{DeliverySink, LogSink, Notice, UserDirectory, UserStore};
pub use user::UserRecord;
