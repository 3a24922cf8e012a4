// src/market/yahoo.rs
use crate::config::MarketConfig;
use crate::domain::errors::{MarketDataError, MarketDataResult};
use crate::domain::models::{Bar, PriceSeries};
use crate::market::client::MarketDataProvider;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

/// Yahoo Finance chart API client.
///
/// Also serves the index-membership universe from a public constituents CSV,
/// normalizing tickers to Yahoo's dash convention (BRK.B -> BRK-B).
pub struct YahooClient {
    http: Client,
    chart_url: String,
    universe_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

// Yahoo emits nulls for halted or missing periods; they surface here as
// None and become NaN bars the feature builder drops.
#[derive(Debug, Deserialize)]
struct QuoteBlock {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

impl YahooClient {
    pub fn new(config: &MarketConfig) -> MarketDataResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("auto_rebalance/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MarketDataError::Request(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            chart_url: config.chart_url.clone(),
            universe_url: config.universe_url.clone(),
        })
    }

    async fn get_text(&self, url: &str) -> MarketDataResult<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MarketDataError::Request(format!("{}", e)))?;

        if !response.status().is_success() {
            return Err(MarketDataError::Request(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::Request(format!("{}", e)))
    }
}

fn value_at(column: &[Option<f64>], i: usize) -> f64 {
    column.get(i).copied().flatten().unwrap_or(f64::NAN)
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> MarketDataResult<PriceSeries> {
        let url = format!(
            "{}/{}?range={}&interval={}",
            self.chart_url, symbol, range, interval
        );

        let body = self.get_text(&url).await?;
        let parsed: ChartResponse = serde_json::from_str(&body)
            .map_err(|e| MarketDataError::Parse(format!("{}: {}", symbol, e)))?;

        if let Some(err) = parsed.chart.error {
            return Err(MarketDataError::NoData(format!("{}: {}", symbol, err)));
        }

        let result = parsed
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| MarketDataError::NoData(symbol.to_string()))?;

        let timestamps = result
            .timestamp
            .ok_or_else(|| MarketDataError::NoData(symbol.to_string()))?;

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::NoData(symbol.to_string()))?;

        let mut series = PriceSeries::new(symbol, interval);
        for (i, ts) in timestamps.iter().enumerate() {
            let timestamp = Utc
                .timestamp_opt(*ts, 0)
                .single()
                .ok_or_else(|| MarketDataError::Parse(format!("{}: bad timestamp {}", symbol, ts)))?;

            series.bars.push(Bar {
                timestamp,
                open: value_at(&quote.open, i),
                high: value_at(&quote.high, i),
                low: value_at(&quote.low, i),
                close: value_at(&quote.close, i),
                volume: value_at(&quote.volume, i),
            });
        }

        if series.bars.is_empty() {
            return Err(MarketDataError::NoData(symbol.to_string()));
        }

        Ok(series)
    }

    async fn list_universe(&self) -> MarketDataResult<Vec<String>> {
        let body = self
            .get_text(&self.universe_url)
            .await
            .map_err(|e| MarketDataError::Universe(format!("{}", e)))?;

        let tickers: Vec<String> = body
            .lines()
            .skip(1) // header
            .filter_map(|line| line.split(',').next())
            .map(|t| t.trim().replace('.', "-"))
            .filter(|t| !t.is_empty())
            .collect();

        if tickers.is_empty() {
            return Err(MarketDataError::Universe(
                "constituent list came back empty".to_string(),
            ));
        }

        Ok(tickers)
    }
}
