// src/broker/alpaca.rs
use crate::broker::client::BrokerageClient;
use crate::config::BrokerConfig;
use crate::domain::errors::{BrokerError, BrokerResult};
use crate::domain::models::{AccountSnapshot, BrokerPosition, OrderReceipt, OrderSide};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

/// Alpaca trading API client (paper endpoint by default).
pub struct AlpacaClient {
    http: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
    data_url: String,
}

// Alpaca returns money amounts as JSON strings.
#[derive(Debug, Deserialize)]
struct AccountRaw {
    buying_power: String,
    cash: String,
    portfolio_value: String,
    last_equity: String,
    #[serde(default)]
    daytrade_count: u32,
}

#[derive(Debug, Deserialize)]
struct PositionRaw {
    symbol: String,
    qty: String,
    market_value: String,
    avg_entry_price: String,
    unrealized_pl: String,
}

#[derive(Debug, Deserialize)]
struct LatestTradeRaw {
    trade: TradeQuoteRaw,
}

#[derive(Debug, Deserialize)]
struct TradeQuoteRaw {
    p: f64,
}

#[derive(Debug, Deserialize)]
struct OrderRaw {
    id: String,
}

fn parse_amount(field: &str, value: &str) -> BrokerResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| BrokerError::Api(format!("Bad {} value {:?}: {}", field, value, e)))
}

impl AlpacaClient {
    pub fn new(config: &BrokerConfig) -> BrokerResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| BrokerError::Request(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.base_url.clone(),
            data_url: config.data_url.clone(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> BrokerResult<T> {
        let response = self
            .http
            .get(url)
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
            .send()
            .await
            .map_err(|e| BrokerError::Request(format!("{}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::Request(format!("{}", e)))?;

        if !status.is_success() {
            return Err(BrokerError::Api(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| BrokerError::Api(format!("Bad response from {}: {}", url, e)))
    }
}

#[async_trait]
impl BrokerageClient for AlpacaClient {
    async fn account(&self) -> BrokerResult<AccountSnapshot> {
        let raw: AccountRaw = self
            .get(&format!("{}/v2/account", self.base_url))
            .await
            .map_err(|e| BrokerError::Account(format!("{}", e)))?;

        Ok(AccountSnapshot {
            buying_power: parse_amount("buying_power", &raw.buying_power)?,
            cash: parse_amount("cash", &raw.cash)?,
            portfolio_value: parse_amount("portfolio_value", &raw.portfolio_value)?,
            last_equity: parse_amount("last_equity", &raw.last_equity)?,
            day_trade_count: raw.daytrade_count,
        })
    }

    async fn open_positions(&self) -> BrokerResult<Vec<BrokerPosition>> {
        let raw: Vec<PositionRaw> = self
            .get(&format!("{}/v2/positions", self.base_url))
            .await
            .map_err(|e| BrokerError::Positions(format!("{}", e)))?;

        raw.into_iter()
            .map(|p| {
                Ok(BrokerPosition {
                    qty: parse_amount("qty", &p.qty)?,
                    market_value: parse_amount("market_value", &p.market_value)?,
                    avg_entry_price: parse_amount("avg_entry_price", &p.avg_entry_price)?,
                    unrealized_pl: parse_amount("unrealized_pl", &p.unrealized_pl)?,
                    symbol: p.symbol,
                })
            })
            .collect()
    }

    async fn latest_price(&self, symbol: &str) -> BrokerResult<Decimal> {
        let raw: LatestTradeRaw = self
            .get(&format!(
                "{}/v2/stocks/{}/trades/latest",
                self.data_url, symbol
            ))
            .await
            .map_err(|e| BrokerError::Quote {
                symbol: symbol.to_string(),
                reason: format!("{}", e),
            })?;

        Decimal::from_f64(raw.trade.p).ok_or_else(|| BrokerError::Quote {
            symbol: symbol.to_string(),
            reason: format!("unrepresentable price {}", raw.trade.p),
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: Decimal,
        side: OrderSide,
    ) -> BrokerResult<OrderReceipt> {
        let body = json!({
            "symbol": symbol,
            "qty": qty.to_string(),
            "side": side.as_str(),
            "type": "market",
            "time_in_force": "gtc",
        });

        let response = self
            .http
            .post(format!("{}/v2/orders", self.base_url))
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::Order {
                symbol: symbol.to_string(),
                reason: format!("{}", e),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| BrokerError::Order {
            symbol: symbol.to_string(),
            reason: format!("{}", e),
        })?;

        if !status.is_success() {
            return Err(BrokerError::Order {
                symbol: symbol.to_string(),
                reason: format!("HTTP {}: {}", status, text),
            });
        }

        let raw: OrderRaw = serde_json::from_str(&text).map_err(|e| BrokerError::Order {
            symbol: symbol.to_string(),
            reason: format!("bad order response: {}", e),
        })?;

        Ok(OrderReceipt {
            order_id: raw.id,
            symbol: symbol.to_string(),
            qty,
            side,
            submitted_at: Utc::now(),
        })
    }
}
