//! Announcement-feed monitor for the listing sniper.
//!
//! Polls the exchange announcements endpoint through a pool of SOCKS5
//! egress proxies with conditional requests, and turns feed changes into
//! `NewListing` events:
//!
//! ```text
//! scheduler -> proxy pool -> prober -(200 + first sighting)-> filter
//!                                  |                             |
//!                            change arbiter                 dispatcher
//!                                                               |
//!                                                  symbol store + event channel
//! ```

pub mod arbiter;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod headers;
pub mod monitor;
pub mod pool;
pub mod prober;

pub use arbiter::ChangeArbiter;
pub use config::{MonitorConfig, PauseWindow, FEED_URL};
pub use dispatcher::ListingDispatcher;
pub use error::{MonitorError, MonitorResult};
pub use filter::{candidate_tickers, extract_tickers, parse_notices, Announcement};
pub use monitor::Monitor;
pub use pool::{ProxyEndpoint, ProxyPool, PENALTY_COOLDOWN, PROACTIVE_COOLDOWN};
pub use prober::{ProbeOutcome, Prober};
