//! Wire types for the v2 mix (USDT-futures) API.
//!
//! The exchange sends numeric values as strings; fields stay `String`
//! at the wire layer and are parsed into decimals at the point of use
//! so a malformed field fails loudly instead of silently zeroing.

use crate::error::{BitgetError, BitgetResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snipe_core::{OrderSide, TradeSide};

/// Success code returned by every v2 endpoint.
pub const SUCCESS_CODE: &str = "00000";

/// Common response envelope: `{code, msg, requestTime, data}`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// Decode an envelope, enforcing the success code.
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> BitgetResult<ApiEnvelope<T>> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| BitgetError::Decode(e.to_string()))?;

    if envelope.code != SUCCESS_CODE {
        let message = envelope.msg.unwrap_or_default();
        if message.contains("Too Many Requests") {
            return Err(BitgetError::RateLimited(message));
        }
        return Err(BitgetError::Api {
            code: envelope.code,
            message,
        });
    }

    Ok(envelope)
}

/// One ticker entry; the v2 endpoint returns an array even for a single
/// symbol and the last price lives in `lastPr`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerData {
    #[serde(rename = "symbol", default)]
    pub symbol: String,
    #[serde(rename = "lastPr")]
    pub last_pr: String,
}

/// One row of `/mix/account/accounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    #[serde(rename = "marginCoin")]
    pub margin_coin: String,
    #[serde(rename = "available")]
    pub available: String,
    #[serde(rename = "locked", default)]
    pub locked: String,
    #[serde(rename = "equity", default)]
    pub equity: String,
    #[serde(rename = "usdtEquity", default)]
    pub usdt_equity: String,
}

/// One open futures position.
#[derive(Debug, Clone, Deserialize)]
pub struct FuturesPosition {
    #[serde(rename = "symbol")]
    pub symbol: String,
    #[serde(rename = "holdSide")]
    pub hold_side: String,
    #[serde(rename = "total", default)]
    pub total: String,
    #[serde(rename = "openPriceAvg", default)]
    pub open_price_avg: String,
    #[serde(rename = "markPrice", default)]
    pub mark_price: String,
    #[serde(rename = "unrealizedPL", default)]
    pub unrealized_pl: String,
    #[serde(rename = "leverage", default)]
    pub leverage: String,
    #[serde(rename = "marginSize", default)]
    pub margin_size: String,
    #[serde(rename = "liquidationPrice", default)]
    pub liquidation_price: String,
}

/// Market order request body.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    #[serde(rename = "productType")]
    pub product_type: String,
    #[serde(rename = "marginMode")]
    pub margin_mode: String,
    #[serde(rename = "marginCoin")]
    pub margin_coin: String,
    pub size: String,
    pub side: OrderSide,
    #[serde(rename = "tradeSide")]
    pub trade_side: TradeSide,
    #[serde(rename = "orderType")]
    pub order_type: String,
    pub force: String,
}

impl OrderRequest {
    /// A market order with the fixed futures parameters: USDT-margined,
    /// isolated mode, good-til-cancelled.
    pub fn market(symbol: &str, side: OrderSide, size_wire: String, trade_side: TradeSide) -> Self {
        Self {
            symbol: symbol.to_string(),
            product_type: "USDT-FUTURES".to_string(),
            margin_mode: "isolated".to_string(),
            margin_coin: "USDT".to_string(),
            size: size_wire,
            side,
            trade_side,
            order_type: "market".to_string(),
            force: "gtc".to_string(),
        }
    }
}

/// Order placement acknowledgment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OrderReceipt {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "clientOid", default)]
    pub client_oid: Option<String>,
}

/// `close-positions` result lists.
#[derive(Debug, Clone, Deserialize)]
pub struct CloseResult {
    #[serde(rename = "successList", default)]
    pub success_list: Vec<OrderReceipt>,
    #[serde(rename = "failureList", default)]
    pub failure_list: Vec<CloseFailure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseFailure {
    #[serde(rename = "symbol", default)]
    pub symbol: String,
    #[serde(rename = "errorMsg", default)]
    pub error_msg: String,
}

impl CloseResult {
    /// First successful close, or the first failure's message as error.
    pub fn into_first_success(self) -> BitgetResult<OrderReceipt> {
        if let Some(receipt) = self.success_list.into_iter().next() {
            return Ok(receipt);
        }
        if let Some(failure) = self.failure_list.into_iter().next() {
            return Err(BitgetError::FlashClose(failure.error_msg));
        }
        Err(BitgetError::FlashClose(
            "no successful closes in response".to_string(),
        ))
    }
}

/// `/api/v2/public/time` payload.
#[derive(Debug, Deserialize)]
pub struct ServerTime {
    #[serde(rename = "serverTime")]
    pub server_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let body = r#"{"code":"00000","msg":"success","requestTime":1,"data":[{"symbol":"XYZUSDT","lastPr":"0.024"}]}"#;
        let envelope: ApiEnvelope<Vec<TickerData>> = parse_envelope(body).unwrap();
        assert_eq!(envelope.data.unwrap()[0].last_pr, "0.024");
    }

    #[test]
    fn test_envelope_api_error() {
        let body = r#"{"code":"40037","msg":"Apikey does not exist","requestTime":1,"data":null}"#;
        let result: BitgetResult<ApiEnvelope<serde_json::Value>> = parse_envelope(body);
        match result {
            Err(BitgetError::Api { code, message }) => {
                assert_eq!(code, "40037");
                assert_eq!(message, "Apikey does not exist");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_rate_limit_by_message() {
        let body = r#"{"code":"429","msg":"Too Many Requests","requestTime":1}"#;
        let result: BitgetResult<ApiEnvelope<serde_json::Value>> = parse_envelope(body);
        assert!(matches!(result, Err(BitgetError::RateLimited(_))));
    }

    #[test]
    fn test_order_request_wire_shape() {
        use snipe_core::Size;
        use rust_decimal_macros::dec;

        let request = OrderRequest::market(
            "XYZUSDT",
            OrderSide::Buy,
            Size::new(dec!(416.66666666)).to_wire(),
            TradeSide::Open,
        );
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();

        assert_eq!(json["symbol"], "XYZUSDT");
        assert_eq!(json["productType"], "USDT-FUTURES");
        assert_eq!(json["marginMode"], "isolated");
        assert_eq!(json["marginCoin"], "USDT");
        assert_eq!(json["size"], "416.66666666");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["tradeSide"], "open");
        assert_eq!(json["orderType"], "market");
        assert_eq!(json["force"], "gtc");
    }

    #[test]
    fn test_close_result_prefers_success() {
        let body = r#"{"successList":[{"orderId":"1","clientOid":"a"}],"failureList":[]}"#;
        let result: CloseResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.into_first_success().unwrap().order_id, "1");
    }

    #[test]
    fn test_close_result_surfaces_failure_message() {
        let body =
            r#"{"successList":[],"failureList":[{"symbol":"XYZUSDT","errorMsg":"No position to close"}]}"#;
        let result: CloseResult = serde_json::from_str(body).unwrap();
        match result.into_first_success() {
            Err(BitgetError::FlashClose(message)) => {
                assert_eq!(message, "No position to close");
            }
            other => panic!("expected FlashClose error, got {other:?}"),
        }
    }

    #[test]
    fn test_close_result_empty_lists_is_error() {
        let result: CloseResult = serde_json::from_str(r#"{}"#).unwrap();
        assert!(result.into_first_success().is_err());
    }

    #[test]
    fn test_position_decode() {
        let body = r#"{
            "symbol": "XYZUSDT",
            "holdSide": "long",
            "total": "416.6",
            "openPriceAvg": "0.024",
            "markPrice": "0.025",
            "unrealizedPL": "41.66",
            "leverage": "10",
            "marginSize": "100",
            "liquidationPrice": "0.0216"
        }"#;
        let position: FuturesPosition = serde_json::from_str(body).unwrap();
        assert_eq!(position.hold_side, "long");
        assert_eq!(position.unrealized_pl, "41.66");
    }
}
