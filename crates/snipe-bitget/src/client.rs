//! The signed REST client.
//!
//! Request signing follows the v2 contract:
//! `sign = base64(HMAC-SHA256(secret, timestamp_ms + METHOD + path_with_query + body))`
//! with the signature and credentials carried in `ACCESS-*` headers.
//!
//! Retry policy: up to three attempts on transport errors and explicit
//! rate limits, exponential backoff at 2^n * 2s. Signature, validation
//! and decode errors surface immediately - retrying them only piles up
//! authentication failures.

use crate::balance::{BalanceCache, BALANCE_FRESHNESS};
use crate::error::{BitgetError, BitgetResult};
use crate::types::{
    parse_envelope, AccountBalance, CloseResult, FuturesPosition, OrderReceipt, OrderRequest,
    ServerTime, TickerData,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use snipe_core::{HoldSide, OrderSide, Price, Size, TradeSide};
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const BASE_URL: &str = "https://api.bitget.com";
const PRODUCT_TYPE: &str = "USDT-FUTURES";
const MARGIN_COIN: &str = "USDT";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

/// Hard deadline on the balance refresh call inside the order path.
const BALANCE_REFRESH_TIMEOUT: Duration = Duration::from_secs(3);

/// One user's API credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

/// Per-user futures client with its own balance cache.
pub struct BitgetClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    balance: BalanceCache,
}

impl BitgetClient {
    pub fn new(credentials: Credentials) -> BitgetResult<Self> {
        Self::with_base_url(credentials, BASE_URL)
    }

    /// Construction against a non-default base URL (tests, mirrors).
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> BitgetResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BitgetError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
            balance: BalanceCache::new(),
        })
    }

    // ------------------------------------------------------------------
    // Market data
    // ------------------------------------------------------------------

    /// Last traded price for a futures symbol.
    pub async fn ticker_price(&self, symbol: &str) -> BitgetResult<Price> {
        let query = [("symbol", symbol), ("productType", PRODUCT_TYPE)];
        let tickers: Vec<TickerData> = self
            .signed_request(Method::GET, "/api/v2/mix/market/ticker", &query, None::<&()>)
            .await?;

        let first = tickers
            .into_iter()
            .next()
            .ok_or_else(|| BitgetError::EmptyData(format!("ticker {symbol}")))?;

        first
            .last_pr
            .parse()
            .map_err(|e| BitgetError::Decode(format!("lastPr '{}': {e}", first.last_pr)))
    }

    /// Exchange server clock, for the startup sync report. Unsigned.
    pub async fn server_time(&self) -> BitgetResult<DateTime<Utc>> {
        let url = format!("{}/api/v2/public/time", self.base_url);
        let body = self.http.get(&url).send().await?.text().await?;
        let envelope = parse_envelope::<ServerTime>(&body)?;
        let data = envelope
            .data
            .ok_or_else(|| BitgetError::EmptyData("server time".to_string()))?;

        let millis: i64 = data
            .server_time
            .parse()
            .map_err(|e| BitgetError::Decode(format!("serverTime '{}': {e}", data.server_time)))?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| BitgetError::Decode(format!("serverTime out of range: {millis}")))
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    /// Set isolated-margin leverage for a symbol. Idempotent exchange-side.
    pub async fn set_leverage(&self, symbol: &str, leverage: u32) -> BitgetResult<()> {
        let body = serde_json::json!({
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
            "leverage": leverage.to_string(),
        });
        let _: serde_json::Value = self
            .signed_request(Method::POST, "/api/v2/mix/account/set-leverage", &[], Some(&body))
            .await?;
        Ok(())
    }

    /// All futures account balances.
    pub async fn accounts(&self) -> BitgetResult<Vec<AccountBalance>> {
        let query = [("productType", PRODUCT_TYPE)];
        self.signed_request(Method::GET, "/api/v2/mix/account/accounts", &query, None::<&()>)
            .await
    }

    /// USDT-denominated available balance.
    pub async fn available_usdt(&self) -> BitgetResult<Decimal> {
        let accounts = self.accounts().await?;
        let usdt = accounts
            .into_iter()
            .find(|account| account.margin_coin == MARGIN_COIN)
            .ok_or(BitgetError::UsdtAccountMissing)?;

        usdt.available
            .parse()
            .map_err(|e| BitgetError::Decode(format!("available '{}': {e}", usdt.available)))
    }

    /// Check the balance cache against a required amount, refreshing when
    /// the cached value is older than the freshness window. The refresh is
    /// bounded by a 3s hard timeout so a slow account endpoint cannot eat
    /// the listing's price window.
    pub async fn has_sufficient_balance(&self, required: Decimal) -> BitgetResult<bool> {
        if let Some(available) = self.balance.fresh_available(BALANCE_FRESHNESS) {
            return Ok(available >= required);
        }

        let refreshed = tokio::time::timeout(BALANCE_REFRESH_TIMEOUT, self.available_usdt())
            .await
            .map_err(|_| BitgetError::BalanceTimeout)??;

        self.balance.update(refreshed);
        Ok(refreshed >= required)
    }

    /// Drop the cached balance (after an order changed it).
    pub fn invalidate_balance(&self) {
        self.balance.invalidate();
    }

    // ------------------------------------------------------------------
    // Orders & positions
    // ------------------------------------------------------------------

    /// Place a market order; size is in base-currency units.
    pub async fn place_market(
        &self,
        symbol: &str,
        side: OrderSide,
        size: Size,
        trade_side: TradeSide,
    ) -> BitgetResult<OrderReceipt> {
        let request = OrderRequest::market(symbol, side, size.to_wire(), trade_side);
        debug!(symbol, %side, size = %request.size, %trade_side, "Placing market order");

        let receipt: OrderReceipt = self
            .signed_request(Method::POST, "/api/v2/mix/order/place-order", &[], Some(&request))
            .await?;

        self.balance.invalidate();
        Ok(receipt)
    }

    /// Exchange-side atomic market close of one position.
    pub async fn flash_close(&self, symbol: &str, hold_side: HoldSide) -> BitgetResult<OrderReceipt> {
        let body = serde_json::json!({
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "holdSide": hold_side.to_string(),
        });
        let result: CloseResult = self
            .signed_request(Method::POST, "/api/v2/mix/order/close-positions", &[], Some(&body))
            .await?;

        self.balance.invalidate();
        result.into_first_success()
    }

    /// Close every open futures position on the account.
    pub async fn close_all(&self) -> BitgetResult<CloseResult> {
        let body = serde_json::json!({ "productType": PRODUCT_TYPE });
        let result: CloseResult = self
            .signed_request(Method::POST, "/api/v2/mix/order/close-positions", &[], Some(&body))
            .await?;

        self.balance.invalidate();
        Ok(result)
    }

    /// All open positions.
    pub async fn all_positions(&self) -> BitgetResult<Vec<FuturesPosition>> {
        let query = [("productType", PRODUCT_TYPE), ("marginCoin", MARGIN_COIN)];
        self.signed_request(Method::GET, "/api/v2/mix/position/all-position", &query, None::<&()>)
            .await
    }

    /// One symbol's open position, if any.
    pub async fn position(&self, symbol: &str) -> BitgetResult<Option<FuturesPosition>> {
        let positions = self.all_positions().await?;
        Ok(positions.into_iter().find(|p| p.symbol == symbol))
    }

    // ------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&impl serde::Serialize>,
    ) -> BitgetResult<T> {
        let body_json = match body {
            Some(body) => serde_json::to_string(body)?,
            None => String::new(),
        };

        let mut attempt = 1;
        loop {
            let result = self
                .send_once::<T>(method.clone(), path, query, &body_json)
                .await;

            match result {
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let backoff = Duration::from_secs(2u64 << attempt);
                    warn!(path, attempt, ?backoff, error = %e, "Request failed, backing off");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body_json: &str,
    ) -> BitgetResult<T> {
        let request_path = build_request_path(path, query);
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign(
            &self.credentials.api_secret,
            &timestamp,
            method.as_str(),
            &request_path,
            body_json,
        )?;

        let url = format!("{}{}", self.base_url, request_path);
        let mut request = self
            .http
            .request(method, &url)
            .header("ACCESS-KEY", &self.credentials.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-PASSPHRASE", &self.credentials.passphrase)
            .header("Content-Type", "application/json")
            .header("locale", "en-US");

        if !body_json.is_empty() {
            request = request.body(body_json.to_string());
        }

        let response = request.send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(BitgetError::RateLimited("HTTP 429".to_string()));
        }

        let text = response.text().await?;
        let envelope = parse_envelope::<T>(&text)?;
        envelope
            .data
            .ok_or_else(|| BitgetError::EmptyData(request_path))
    }
}

/// `path?k=v&k2=v2`, also the exact string that gets signed.
fn build_request_path(path: &str, query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let joined: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}?{}", path, joined.join("&"))
}

/// base64(HMAC-SHA256(secret, timestamp + METHOD + requestPath + body))
fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> BitgetResult<String> {
    let prehash = format!("{timestamp}{method}{request_path}{body}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BitgetError::Signing(e.to_string()))?;
    mac.update(prehash.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
