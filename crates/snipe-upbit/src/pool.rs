//! Proxy pool and cooldown management.
//!
//! Every probe goes out through one of up to 24 SOCKS5 egress proxies.
//! A proxy that was just used gets a short proactive cooldown so no
//! single egress IP hammers the feed; a proxy that got rate-limited gets
//! a long penalty cooldown. Selection from the eligible set is uniform
//! random to break the deterministic rotation patterns bot-detectors
//! key on.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Quiet window after every use of a proxy.
pub const PROACTIVE_COOLDOWN: Duration = Duration::from_secs(3);

/// Quiet window after a proxy observed a 429.
pub const PENALTY_COOLDOWN: Duration = Duration::from_secs(30);

/// One egress proxy.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    /// SOCKS5 connect URL, treated as opaque.
    pub url: String,
    /// Operator-facing label ("Proxy #1 (Seoul)").
    pub name: String,
}

impl ProxyEndpoint {
    /// Label proxies by position; the first two are the Seoul egresses
    /// in the standard deployment. Cosmetic only, selection is uniform.
    pub fn labeled(index: usize, url: impl Into<String>) -> Self {
        let name = if index < 2 {
            format!("Proxy #{} (Seoul)", index + 1)
        } else {
            format!("Proxy #{}", index + 1)
        };
        Self {
            url: url.into(),
            name,
        }
    }
}

/// Ordered proxy list plus per-index cooldown expiries.
pub struct ProxyPool {
    proxies: Vec<ProxyEndpoint>,
    cooldowns: RwLock<HashMap<usize, Instant>>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<ProxyEndpoint>) -> Self {
        Self {
            proxies,
            cooldowns: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn endpoint(&self, index: usize) -> &ProxyEndpoint {
        &self.proxies[index]
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.proxies
    }

    /// Indices with no active cooldown. Expired entries are purged as a
    /// side effect so the map never grows past the pool size.
    pub fn eligible(&self) -> Vec<usize> {
        let now = Instant::now();
        let mut cooldowns = self.cooldowns.write();

        cooldowns.retain(|_, expires| *expires > now);

        (0..self.proxies.len())
            .filter(|index| !cooldowns.contains_key(index))
            .collect()
    }

    /// Pick a uniformly random eligible proxy, if any.
    pub fn pick_eligible(&self) -> Option<usize> {
        let eligible = self.eligible();
        eligible.choose(&mut rand::thread_rng()).copied()
    }

    /// Quiet a proxy for the given duration.
    pub fn apply_cooldown(&self, index: usize, duration: Duration) {
        let expires = Instant::now() + duration;
        self.cooldowns.write().insert(index, expires);
        debug!(proxy = index, ?duration, "Cooldown applied");
    }

    /// Remaining cooldown for a proxy, if any.
    pub fn cooldown_remaining(&self, index: usize) -> Option<Duration> {
        let cooldowns = self.cooldowns.read();
        let expires = cooldowns.get(&index)?;
        expires.checked_duration_since(Instant::now())
    }
}
