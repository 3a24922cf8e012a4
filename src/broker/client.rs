// src/broker/client.rs
use crate::domain::errors::BrokerResult;
use crate::domain::models::{AccountSnapshot, BrokerPosition, OrderReceipt, OrderSide};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Brokerage service interface
///
/// Every call may fail independently; callers decide per-symbol whether a
/// failure is soft (skip and continue) or aborts the phase.
#[async_trait]
pub trait BrokerageClient: Send + Sync {
    /// Query account state (buying power, cash, portfolio value, ...)
    async fn account(&self) -> BrokerResult<AccountSnapshot>;

    /// Query all currently held positions
    async fn open_positions(&self) -> BrokerResult<Vec<BrokerPosition>>;

    /// Latest trade price for a symbol
    async fn latest_price(&self, symbol: &str) -> BrokerResult<Decimal>;

    /// Submit a market order (good-till-canceled)
    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: Decimal,
        side: OrderSide,
    ) -> BrokerResult<OrderReceipt>;
}
