// src/market/client.rs
use crate::domain::errors::MarketDataResult;
use crate::domain::models::PriceSeries;
use async_trait::async_trait;

/// Market data provider interface
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch OHLCV bars for a symbol over a lookback range and bar interval
    /// (e.g. range "1y", interval "1d")
    async fn fetch_bars(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> MarketDataResult<PriceSeries>;

    /// Fetch the reference list of index-member ticker symbols
    async fn list_universe(&self) -> MarketDataResult<Vec<String>>;
}
