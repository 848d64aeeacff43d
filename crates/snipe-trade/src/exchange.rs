//! The exchange seam.
//!
//! The orchestrator and reminder loop talk to the exchange through this
//! trait so fan-out logic can be exercised against a fake. The real
//! implementation is the per-user `BitgetClient`.

use crate::error::{TradeError, TradeResult};
use async_trait::async_trait;
use rust_decimal::Decimal;
use snipe_bitget::{BitgetClient, Credentials, OrderReceipt};
use snipe_core::{HoldSide, OrderSide, Price, Size, TradeSide};
use snipe_registry::UserRecord;
use std::sync::Arc;

/// Exchange operations the trading path needs.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Balance pre-check through the cache (freshness window applies).
    async fn has_sufficient_balance(&self, required: Decimal) -> TradeResult<bool>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> TradeResult<()>;

    async fn ticker_price(&self, symbol: &str) -> TradeResult<Price>;

    async fn place_market(
        &self,
        symbol: &str,
        side: OrderSide,
        size: Size,
        trade_side: TradeSide,
    ) -> TradeResult<OrderReceipt>;

    async fn flash_close(&self, symbol: &str, hold_side: HoldSide) -> TradeResult<OrderReceipt>;

    async fn close_all(&self) -> TradeResult<()>;

    /// The exchange's reported unrealized P&L for an open position, if
    /// the position (and the field) exists.
    async fn unrealized_pnl(&self, symbol: &str) -> TradeResult<Option<Decimal>>;
}

#[async_trait]
impl Exchange for BitgetClient {
    async fn has_sufficient_balance(&self, required: Decimal) -> TradeResult<bool> {
        Ok(BitgetClient::has_sufficient_balance(self, required).await?)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> TradeResult<()> {
        Ok(BitgetClient::set_leverage(self, symbol, leverage).await?)
    }

    async fn ticker_price(&self, symbol: &str) -> TradeResult<Price> {
        Ok(BitgetClient::ticker_price(self, symbol).await?)
    }

    async fn place_market(
        &self,
        symbol: &str,
        side: OrderSide,
        size: Size,
        trade_side: TradeSide,
    ) -> TradeResult<OrderReceipt> {
        Ok(BitgetClient::place_market(self, symbol, side, size, trade_side).await?)
    }

    async fn flash_close(&self, symbol: &str, hold_side: HoldSide) -> TradeResult<OrderReceipt> {
        Ok(BitgetClient::flash_close(self, symbol, hold_side).await?)
    }

    async fn close_all(&self) -> TradeResult<()> {
        BitgetClient::close_all(self).await?;
        Ok(())
    }

    async fn unrealized_pnl(&self, symbol: &str) -> TradeResult<Option<Decimal>> {
        let Some(position) = self.position(symbol).await? else {
            return Ok(None);
        };
        // An absent or malformed field falls back to the price-delta
        // computation at the call site.
        Ok(position.unrealized_pl.parse().ok())
    }
}

/// Builds a per-user exchange client; the seam tests inject fakes through.
pub type ExchangeFactory =
    Arc<dyn Fn(&UserRecord) -> TradeResult<Arc<dyn Exchange>> + Send + Sync>;

/// The production factory: one `BitgetClient` per user, so credentials
/// and balance caches never cross user boundaries.
pub fn bitget_factory() -> ExchangeFactory {
    Arc::new(|user: &UserRecord| {
        let client = BitgetClient::new(Credentials {
            api_key: user.api_key.clone(),
            api_secret: user.api_secret.clone(),
            passphrase: user.api_passphrase.clone(),
        })
        .map_err(TradeError::Exchange)?;
        Ok(Arc::new(client) as Arc<dyn Exchange>)
    })
}
