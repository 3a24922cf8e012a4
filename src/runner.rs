// src/runner.rs
use crate::broker::client::BrokerageClient;
use crate::engine::ranking::RankingEngine;
use crate::market::client::MarketDataProvider;
use crate::store::rankings::RankingStore;
use crate::trading::rebalance::Rebalancer;
use tokio::time::{sleep, Duration, Instant};

/// Poll until a ranking file exists or the wait budget runs out.
///
/// This is the only cross-process coordination point: the signal engine
/// publishes a file, the rebalancer waits for one. Both durations are
/// injected so tests can shrink them.
pub async fn wait_for_ranking(
    store: &RankingStore,
    budget: Duration,
    poll_interval: Duration,
) -> bool {
    let deadline = Instant::now() + budget;

    loop {
        if store.has_rankings() {
            return true;
        }

        if Instant::now() >= deadline {
            log::error!(
                "Timed out after {}s waiting for a ranking file in {}",
                budget.as_secs(),
                store.dir().display()
            );
            return false;
        }

        log::info!("Waiting for rankings to be generated...");
        sleep(poll_interval).await;
    }
}

/// The full system: one signal pass followed by one rebalance pass, with a
/// bounded wait in between. Stage failures come back as `false`; they are
/// decisions for the process boundary, not exceptions.
pub struct TradingSystem<M: MarketDataProvider, B: BrokerageClient> {
    engine: RankingEngine<M>,
    rebalancer: Rebalancer<B>,
    store: RankingStore,
    ranking_wait: Duration,
    poll_interval: Duration,
}

impl<M: MarketDataProvider, B: BrokerageClient> TradingSystem<M, B> {
    pub fn new(
        engine: RankingEngine<M>,
        rebalancer: Rebalancer<B>,
        store: RankingStore,
        ranking_wait: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            rebalancer,
            store,
            ranking_wait,
            poll_interval,
        }
    }

    /// Run the signal generation stage. Returns whether a ranking was
    /// published.
    pub async fn run_signal_stage(&self) -> bool {
        log::info!("=== Step 1: stock analysis ===");

        match self.engine.run().await {
            Ok(_) => true,
            Err(e) => {
                log::error!("Signal generation failed: {}", e);
                false
            }
        }
    }

    /// Run the trading stage against the latest published ranking.
    pub async fn run_trading_stage(&self) -> bool {
        log::info!("=== Step 2: trade execution ===");

        if self.rebalancer.log_account_status().await.is_err() {
            log::error!("Could not get account information");
            return false;
        }

        if let Err(e) = self.rebalancer.rebalance().await {
            log::error!("Rebalance failed: {}", e);
            return false;
        }

        self.rebalancer.log_portfolio_summary().await;
        true
    }

    /// One complete run: signal stage, bounded wait, trading stage.
    pub async fn run(&self) -> bool {
        if !self.run_signal_stage().await {
            log::error!("Data analysis failed. Stopping.");
            return false;
        }

        if !wait_for_ranking(&self.store, self.ranking_wait, self.poll_interval).await {
            return false;
        }

        if !self.run_trading_stage().await {
            log::error!("Trading failed.");
            return false;
        }

        log::info!("Trading system completed successfully");
        true
    }
}
