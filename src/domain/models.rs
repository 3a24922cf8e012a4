// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One OHLCV bar. Prices stay `f64` because the whole series feeds the
/// feature builder; money amounts on the brokerage side use `Decimal`.
#[derive(Debug, Clone)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar is usable only if every field is a finite number. Providers map
    /// gaps in the raw feed to NaN, which this filters out downstream.
    pub fn is_complete(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Chronologically ordered per-symbol price history for one ranking pass.
/// Never persisted; rebuilt from the provider every cycle.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    pub interval: String,
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            bars: Vec::new(),
        }
    }
}

/// One line of a published ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingEntry {
    pub ticker: String,
    pub sharpe_ratio: f64,
}

/// Account state as reported by the brokerage.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub buying_power: Decimal,
    pub cash: Decimal,
    pub portfolio_value: Decimal,
    pub last_equity: Decimal,
    pub day_trade_count: u32,
}

/// A live position as reported by the brokerage. Authoritative for the
/// liquidation phase; the locally persisted book is intent only.
#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: Decimal,
    pub market_value: Decimal,
    pub avg_entry_price: Decimal,
    pub unrealized_pl: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Acknowledgement returned by the brokerage for a submitted order.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub order_id: String,
    pub symbol: String,
    pub qty: Decimal,
    pub side: OrderSide,
    pub submitted_at: DateTime<Utc>,
}

/// A position as recorded at order submission time.
///
/// `expected_price` is the quote at decision time, not the realized fill
/// price; nothing reconciles it against actual fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Decimal,
    pub expected_price: Decimal,
    pub sharpe_ratio: f64,
    pub order_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Symbol -> position mapping, overwritten whole on every rebalance.
pub type PositionBook = BTreeMap<String, Position>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

/// Append-only trade log entry; one per submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpe_ratio: Option<f64>,
    #[serde(rename = "type")]
    pub order_type: String,
    pub order_id: String,
    pub reason: String,
}

impl TradeRecord {
    pub fn sell(symbol: &str, quantity: Decimal, order_id: &str, reason: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action: TradeAction::Sell,
            quantity,
            expected_price: None,
            sharpe_ratio: None,
            order_type: "market".to_string(),
            order_id: order_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn buy(
        symbol: &str,
        quantity: Decimal,
        expected_price: Decimal,
        sharpe_ratio: f64,
        order_id: &str,
        reason: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            quantity,
            expected_price: Some(expected_price),
            sharpe_ratio: Some(sharpe_ratio),
            order_type: "market".to_string(),
            order_id: order_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
