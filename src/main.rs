// src/main.rs
use auto_rebalance::broker::alpaca::AlpacaClient;
use auto_rebalance::config::Config;
use auto_rebalance::domain::errors::AppResult;
use auto_rebalance::engine::ranking::RankingEngine;
use auto_rebalance::market::yahoo::YahooClient;
use auto_rebalance::runner::TradingSystem;
use auto_rebalance::store::ledger::TradeLedger;
use auto_rebalance::store::rankings::RankingStore;
use auto_rebalance::trading::rebalance::{RebalanceSettings, Rebalancer};

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::time::Duration;

const USAGE: &str = "\
auto_rebalance - ML-ranked portfolio rebalancer

Usage:
    auto_rebalance            Run one ranking + rebalance cycle
    auto_rebalance --help     Show this help

Configuration comes from the environment (or a .env file). Required:
    APCA_API_KEY_ID, APCA_API_SECRET_KEY

Exits 0 on full success, 1 on any failure.";

fn build_system(config: &Config) -> AppResult<TradingSystem<YahooClient, AlpacaClient>> {
    let store = RankingStore::new(&config.storage.shared_data_dir);
    let ledger = TradeLedger::new(&config.storage.shared_data_dir);

    let market = Arc::new(YahooClient::new(&config.market)?);
    let broker = Arc::new(AlpacaClient::new(&config.broker)?);

    let engine = RankingEngine::new(market, store.clone(), config.signal.clone());

    let rebalancer = Rebalancer::new(
        broker,
        store.clone(),
        ledger,
        RebalanceSettings {
            top_n: config.trading.top_n,
            reserve_fraction: config.trading.reserve_fraction,
            settle_delay: Duration::from_secs(config.trading.settle_delay_secs),
        },
    );

    Ok(TradingSystem::new(
        engine,
        rebalancer,
        store,
        Duration::from_secs(config.runner.ranking_wait_secs),
        Duration::from_secs(config.runner.poll_interval_secs),
    ))
}

#[tokio::main]
async fn main() {
    if std::env::args().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    log::info!("Starting auto_rebalance v{}", env!("CARGO_PKG_VERSION"));

    let system = match build_system(&config) {
        Ok(system) => system,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let success = tokio::select! {
        success = system.run() => success,
        _ = ctrl_c() => {
            log::warn!("Interrupted, stopping");
            false
        }
    };

    std::process::exit(if success { 0 } else { 1 });
}
