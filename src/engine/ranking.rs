// src/engine/ranking.rs
use crate::config::SignalConfig;
use crate::domain::errors::{AppError, AppResult, MarketDataError};
use crate::domain::models::RankingEntry;
use crate::engine::features::FeatureTable;
use crate::engine::model::{ModelPair, ModelSettings};
use crate::market::client::MarketDataProvider;
use crate::store::rankings::RankingStore;
use std::cmp::Ordering;
use std::sync::Arc;

/// Per-symbol scoring result. Failures carry the reason so the skip policy
/// is an explicit data transformation rather than a caught exception.
#[derive(Debug)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub result: Result<f64, String>,
}

/// Collect successful scores, sort descending (stable, so encounter order
/// breaks ties) and keep the top N.
pub fn rank_outcomes(outcomes: Vec<SymbolOutcome>, top_n: usize) -> Vec<RankingEntry> {
    let mut ranking: Vec<RankingEntry> = outcomes
        .into_iter()
        .filter_map(|o| {
            o.result.ok().map(|score| RankingEntry {
                ticker: o.symbol,
                sharpe_ratio: score,
            })
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.sharpe_ratio
            .partial_cmp(&a.sharpe_ratio)
            .unwrap_or(Ordering::Equal)
    });
    ranking.truncate(top_n);
    ranking
}

/// Signal Generation Engine: runs Builder -> Trainer -> Predictor across the
/// universe, one symbol at a time, and publishes the result.
pub struct RankingEngine<M: MarketDataProvider> {
    market: Arc<M>,
    store: RankingStore,
    config: SignalConfig,
}

impl<M: MarketDataProvider> RankingEngine<M> {
    pub fn new(market: Arc<M>, store: RankingStore, config: SignalConfig) -> Self {
        Self {
            market,
            store,
            config,
        }
    }

    async fn score_symbol(&self, symbol: &str) -> AppResult<f64> {
        let series = self
            .market
            .fetch_bars(symbol, &self.config.lookback, &self.config.interval)
            .await?;

        let table = FeatureTable::from_series(&series, self.config.min_rows)?;

        let settings = ModelSettings {
            n_estimators: self.config.n_estimators,
            seed: self.config.seed,
            test_fraction: self.config.test_fraction,
        };

        let pair = ModelPair::fit(&table, &settings)?;
        Ok(pair.predict_score(&table)?)
    }

    /// Score every candidate; failures are warned and recorded, never fatal.
    pub async fn score_universe(&self, symbols: &[String]) -> Vec<SymbolOutcome> {
        let total = symbols.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, symbol) in symbols.iter().enumerate() {
            log::debug!("Scoring {} ({}/{})", symbol, i + 1, total);

            let result = match self.score_symbol(symbol).await {
                Ok(score) => Ok(score),
                Err(e) => {
                    log::warn!("Skipping {}: {}", symbol, e);
                    Err(format!("{}", e))
                }
            };

            outcomes.push(SymbolOutcome {
                symbol: symbol.clone(),
                result,
            });
        }

        outcomes
    }

    /// One full ranking cycle: fetch the universe, score it, publish the
    /// top-N ranking and the holdings snapshot.
    pub async fn run(&self) -> AppResult<Vec<RankingEntry>> {
        let universe = self
            .market
            .list_universe()
            .await
            .map_err(AppError::MarketData)?;

        if universe.is_empty() {
            return Err(AppError::MarketData(MarketDataError::Universe(
                "universe is empty, nothing to rank".to_string(),
            )));
        }

        log::info!("Ranking {} candidate symbols", universe.len());

        let outcomes = self.score_universe(&universe).await;
        let scored = outcomes.iter().filter(|o| o.result.is_ok()).count();
        log::info!("Scored {}/{} symbols", scored, universe.len());

        let ranking = rank_outcomes(outcomes, self.config.top_n);

        let path = self.store.save_ranking(&ranking)?;
        self.store.save_holdings(&ranking)?;
        log::info!("Published ranking of {} symbols to {}", ranking.len(), path.display());

        Ok(ranking)
    }
}
