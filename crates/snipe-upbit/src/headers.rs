//! Browser-fingerprint request headers.
//!
//! The announcement endpoint serves real browsers; a bare HTTP client
//! stands out. Every probe therefore carries the header set a Chrome
//! cross-origin XHR from the exchange's own site would send, with the
//! User-Agent rotated round-robin through a pool of current browsers so
//! the distribution across probes stays even.

use parking_lot::Mutex;
use reqwest::RequestBuilder;

/// Realistic User-Agent pool, current desktop browsers.
const USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    // Firefox on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Round-robin User-Agent rotation.
///
/// The lock keeps rotation even across concurrent probes; random choice
/// would skew the distribution over short windows.
pub struct UserAgentPool {
    index: Mutex<usize>,
}

impl UserAgentPool {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(0),
        }
    }

    pub fn next(&self) -> &'static str {
        let mut index = self.index.lock();
        let agent = USER_AGENTS[*index];
        *index = (*index + 1) % USER_AGENTS.len();
        agent
    }

    pub fn len(&self) -> usize {
        USER_AGENTS.len()
    }

    pub fn is_empty(&self) -> bool {
        USER_AGENTS.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the full browser-fingerprint header set for a feed request.
pub fn apply_browser_headers(request: RequestBuilder, user_agent: &str) -> RequestBuilder {
    request
        .header("User-Agent", user_agent)
        .header("Accept", "application/json, text/plain, */*")
        .header("Accept-Language", "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7")
        .header("Referer", "https://upbit.com/")
        .header("Origin", "https://upbit.com")
        .header("Sec-Fetch-Dest", "empty")
        .header("Sec-Fetch-Mode", "cors")
        .header("Sec-Fetch-Site", "same-site")
        .header("Connection", "keep-alive")
        .header("Cache-Control", "no-cache")
        .header("Pragma", "no-cache")
        .header(
            "Sec-Ch-Ua",
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
        )
        .header("Sec-Ch-Ua-Mobile", "?0")
        .header("Sec-Ch-Ua-Platform", "\"Windows\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_has_at_least_ten_agents() {
        assert!(UserAgentPool::new().len() >= 10);
    }

    #[test]
    fn test_round_robin_rotation() {
        let pool = UserAgentPool::new();
        let first = pool.next();
        let second = pool.next();
        assert_ne!(first, second);

        // A full cycle returns to the first agent
        for _ in 0..pool.len() - 2 {
            pool.next();
        }
        assert_eq!(pool.next(), first);
    }

    #[test]
    fn test_distribution_is_even() {
        let pool = UserAgentPool::new();
        let mut counts = std::collections::HashMap::new();
        for _ in 0..pool.len() * 7 {
            *counts.entry(pool.next()).or_insert(0usize) += 1;
        }
        assert!(counts.values().all(|&count| count == 7));
    }
}
