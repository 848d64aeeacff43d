//! Announcement filtering and ticker extraction.
//!
//! Titles are multilingual (mostly Korean) free text. Rule matching runs
//! over a normalized form with all Unicode punctuation, symbols,
//! separators and whitespace stripped, so spacing and decoration in the
//! feed never break a rule. A rule matches when *all* of its tokens are
//! present (AND over tokens, OR over rules).
//!
//! Evaluation order per title:
//! 1. negative rules   - any match discards the title
//! 2. positive rules   - at least one must match
//! 3. maintenance rules - any match discards the title
//! 4. ticker extraction from parenthesized groups of the *raw* title

use regex::Regex;
use serde::Deserialize;
use snipe_core::Ticker;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Raw feed envelope: `{success, data: {notices: [{id, title}]}}`.
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub success: bool,
    pub data: FeedData,
}

#[derive(Debug, Deserialize)]
pub struct FeedData {
    pub notices: Vec<Announcement>,
}

/// One announcement as received.
#[derive(Debug, Clone, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
}

static NORMALIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}\p{S}\p{Z}\s]+").expect("static regex"));

static PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("static regex"));

static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\s]+").expect("static regex"));

/// Korean market-indicator token; a parenthesized group naming the market
/// ("KRW 마켓") never contains a ticker.
const MARKET_INDICATOR: &str = "마켓";

/// Negative rules: matching titles are discarded outright.
/// {trading-support, ended}, {delisting}, {caution, designation, item},
/// {investment, caution, urge}, {caution, urge},
/// {caution, designation, item, release}
const NEGATIVE_RULES: &[&[&str]] = &[
    &["거래지원", "종료"],
    &["상장폐지"],
    &["유의", "종목", "지정"],
    &["투자", "유의", "촉구"],
    &["유의", "촉구"],
    &["유의", "종목", "지정", "해제"],
];

/// Positive rules: at least one must match.
/// {new, trading-support} or {digital, asset, addition}
const POSITIVE_RULES: &[&[&str]] = &[&["신규", "거래지원"], &["디지털", "자산", "추가"]];

/// Maintenance tokens: change, postpone, extend, resume,
/// deposit-withdrawal, event, withdrawal-fee.
const MAINTENANCE_TOKENS: &[&str] =
    &["변경", "연기", "연장", "재개", "입출금", "이벤트", "출금수수료"];

/// Strip every punctuation, symbol, separator and whitespace character.
fn normalize(text: &str) -> String {
    NORMALIZE_RE.replace_all(text, "").into_owned()
}

fn contains_all(normalized_title: &str, tokens: &[&str]) -> bool {
    tokens.iter().all(|token| normalized_title.contains(token))
}

fn matches_any_rule(normalized_title: &str, rules: &[&[&str]]) -> bool {
    rules.iter().any(|rule| contains_all(normalized_title, rule))
}

fn is_maintenance(normalized_title: &str) -> bool {
    MAINTENANCE_TOKENS
        .iter()
        .any(|token| normalized_title.contains(token))
}

/// Extract candidate tickers from the parenthesized groups of a raw title.
///
/// Groups containing the market indicator are skipped; tokens are split
/// on commas/whitespace, stripped to `[A-Z0-9]`, validated through
/// `Ticker` (which rejects quote-market labels), and deduplicated within
/// the title in first-seen order.
pub fn extract_tickers(title: &str) -> Vec<Ticker> {
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();

    for group in PAREN_RE.captures_iter(title) {
        let content = &group[1];
        if content.contains(MARKET_INDICATOR) {
            continue;
        }

        for part in SPLIT_RE.split(content) {
            let stripped: String = part
                .chars()
                .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
                .collect();

            if let Ok(ticker) = Ticker::new(stripped) {
                if seen.insert(ticker.clone()) {
                    tickers.push(ticker);
                }
            }
        }
    }

    tickers
}

/// Apply the full rule chain to one title.
///
/// Returns the title's candidate tickers, empty when any rule discards it.
pub fn candidate_tickers(title: &str) -> Vec<Ticker> {
    let normalized = normalize(title);

    if matches_any_rule(&normalized, NEGATIVE_RULES) {
        debug!(title, "Discarded by negative rule");
        return Vec::new();
    }
    if !matches_any_rule(&normalized, POSITIVE_RULES) {
        return Vec::new();
    }
    if is_maintenance(&normalized) {
        debug!(title, "Discarded by maintenance rule");
        return Vec::new();
    }

    extract_tickers(title)
}

/// Decode a feed body and produce the batch candidate set: the union of
/// every surviving title's tickers.
pub fn parse_notices(body: &str) -> serde_json::Result<Vec<Ticker>> {
    let response: FeedResponse = serde_json::from_str(body)?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for announcement in &response.data.notices {
        for ticker in candidate_tickers(&announcement.title) {
            if seen.insert(ticker.clone()) {
                candidates.push(ticker);
            }
        }
    }
    Ok(candidates)
}
