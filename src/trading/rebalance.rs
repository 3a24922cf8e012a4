// src/trading/rebalance.rs
use crate::broker::client::BrokerageClient;
use crate::domain::errors::AppResult;
use crate::domain::models::{OrderSide, Position, PositionBook, TradeRecord};
use crate::store::ledger::TradeLedger;
use crate::store::rankings::RankingStore;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

const SELL_REASON: &str = "daily_rebalance";
const BUY_REASON: &str = "top_ranked_stock";

/// Rebalancing parameters.
#[derive(Debug, Clone)]
pub struct RebalanceSettings {
    /// Number of positions to target
    pub top_n: usize,
    /// Fraction of buying power deployed; the rest stays in reserve
    pub reserve_fraction: Decimal,
    /// Heuristic wait for sells to clear before reading buying power
    pub settle_delay: Duration,
}

impl Default for RebalanceSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            reserve_fraction: Decimal::new(9, 1),
            settle_delay: Duration::from_secs(30),
        }
    }
}

/// Rebalancing Controller: one liquidate-then-allocate pass per cycle.
pub struct Rebalancer<B: BrokerageClient> {
    broker: Arc<B>,
    rankings: RankingStore,
    ledger: TradeLedger,
    settings: RebalanceSettings,
}

impl<B: BrokerageClient> Rebalancer<B> {
    pub fn new(
        broker: Arc<B>,
        rankings: RankingStore,
        ledger: TradeLedger,
        settings: RebalanceSettings,
    ) -> Self {
        Self {
            broker,
            rankings,
            ledger,
            settings,
        }
    }

    fn record_trade(&self, record: TradeRecord) {
        // A ledger write failure must not stop the trading pass.
        if let Err(e) = self.ledger.append_trade(record) {
            log::warn!("Failed to append trade record: {}", e);
        }
    }

    /// Phase 1: market-sell every currently held long position.
    ///
    /// Broker state is authoritative here, not the persisted book. Only
    /// strictly positive quantities are sold; negative (short) quantities
    /// are left untouched, mirroring the long-only allocation. Per-symbol
    /// submission failures are logged and skipped.
    pub async fn liquidate_all(&self) -> AppResult<usize> {
        let positions = self.broker.open_positions().await?;
        let mut sold = 0;

        for position in positions {
            if position.qty <= Decimal::ZERO {
                if position.qty < Decimal::ZERO {
                    log::warn!(
                        "Leaving short position untouched: {} qty {}",
                        position.symbol,
                        position.qty
                    );
                }
                continue;
            }

            match self
                .broker
                .submit_market_order(&position.symbol, position.qty, OrderSide::Sell)
                .await
            {
                Ok(receipt) => {
                    self.record_trade(TradeRecord::sell(
                        &position.symbol,
                        position.qty,
                        &receipt.order_id,
                        SELL_REASON,
                    ));
                    log::info!("SELL order submitted: {} x{}", position.symbol, position.qty);
                    sold += 1;
                }
                Err(e) => {
                    log::warn!("Failed to sell {}: {}", position.symbol, e);
                }
            }
        }

        // Intent: flat. Recorded before sells are confirmed.
        self.ledger.save_positions(&PositionBook::new())?;

        if !self.settings.settle_delay.is_zero() {
            log::info!(
                "Waiting {}s for sell orders to clear...",
                self.settings.settle_delay.as_secs()
            );
            sleep(self.settings.settle_delay).await;
        }

        Ok(sold)
    }

    /// Phase 2: buy the top-N ranked symbols with equal budgets.
    ///
    /// Aborts if no ranking has been published or the account query fails.
    /// A symbol whose budget buys zero whole shares is skipped without error.
    pub async fn allocate_top(&self) -> AppResult<usize> {
        let ranking = self.rankings.load_latest()?;
        let account = self.broker.account().await?;

        let available = account.buying_power * self.settings.reserve_fraction;
        let per_symbol_budget = available / Decimal::from(self.settings.top_n as u64);

        log::info!(
            "Buying power: ${}, deploying ${} (${} per symbol)",
            account.buying_power,
            available,
            per_symbol_budget
        );

        let mut book = PositionBook::new();

        for entry in ranking.iter().take(self.settings.top_n) {
            let price = match self.broker.latest_price(&entry.ticker).await {
                Ok(price) if price > Decimal::ZERO => price,
                Ok(price) => {
                    log::warn!("Ignoring non-positive quote for {}: {}", entry.ticker, price);
                    continue;
                }
                Err(e) => {
                    log::warn!("No price for {}: {}", entry.ticker, e);
                    continue;
                }
            };

            let quantity = (per_symbol_budget / price).floor();
            if quantity <= Decimal::ZERO {
                log::info!(
                    "Budget ${} too small for {} @ ${}, skipping",
                    per_symbol_budget,
                    entry.ticker,
                    price
                );
                continue;
            }

            let receipt = match self
                .broker
                .submit_market_order(&entry.ticker, quantity, OrderSide::Buy)
                .await
            {
                Ok(receipt) => receipt,
                Err(e) => {
                    log::warn!("Failed to buy {}: {}", entry.ticker, e);
                    continue;
                }
            };

            self.record_trade(TradeRecord::buy(
                &entry.ticker,
                quantity,
                price,
                entry.sharpe_ratio,
                &receipt.order_id,
                BUY_REASON,
            ));

            book.insert(
                entry.ticker.clone(),
                Position {
                    quantity,
                    expected_price: price,
                    sharpe_ratio: entry.sharpe_ratio,
                    order_id: receipt.order_id,
                    timestamp: Utc::now(),
                },
            );

            log::info!(
                "BUY order submitted: {} x{} @ ${} (Sharpe: {:.3})",
                entry.ticker,
                quantity,
                price,
                entry.sharpe_ratio
            );
        }

        let bought = book.len();
        self.ledger.save_positions(&book)?;
        log::info!("Submitted buy orders for {} stocks", bought);

        Ok(bought)
    }

    /// One full rebalance cycle. A phase 1 hard failure aborts before
    /// phase 2; per-symbol problems inside either phase do not.
    pub async fn rebalance(&self) -> AppResult<()> {
        log::info!("=== Starting portfolio rebalance ===");

        log::info!("Step 1: selling all current positions");
        self.liquidate_all().await?;

        log::info!("Step 2: buying top ranked stocks");
        self.allocate_top().await?;

        log::info!("=== Rebalance complete ===");
        Ok(())
    }

    /// Log account state before trading (portfolio value, buying power, cash).
    pub async fn log_account_status(&self) -> AppResult<()> {
        let account = self.broker.account().await?;
        log::info!(
            "Account: portfolio ${}, buying power ${}, cash ${}, day trades {}",
            account.portfolio_value,
            account.buying_power,
            account.cash,
            account.day_trade_count
        );
        Ok(())
    }

    /// Log a post-rebalance summary: total value, day change, position count.
    pub async fn log_portfolio_summary(&self) {
        let account = match self.broker.account().await {
            Ok(account) => account,
            Err(e) => {
                log::warn!("Could not fetch portfolio summary: {}", e);
                return;
            }
        };

        let positions = match self.broker.open_positions().await {
            Ok(positions) => positions.len(),
            Err(_) => 0,
        };

        log::info!(
            "Portfolio: total ${}, day change ${}, {} open positions",
            account.portfolio_value,
            account.portfolio_value - account.last_equity,
            positions
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{BrokerError, BrokerResult};
    use crate::domain::models::{AccountSnapshot, BrokerPosition, OrderReceipt, RankingEntry};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    struct SubmittedOrder {
        symbol: String,
        qty: Decimal,
        side: OrderSide,
    }

    struct MockBroker {
        account: AccountSnapshot,
        positions: Vec<BrokerPosition>,
        prices: HashMap<String, Decimal>,
        orders: Mutex<Vec<SubmittedOrder>>,
        reject: Vec<String>,
    }

    impl MockBroker {
        fn new(buying_power: Decimal) -> Self {
            Self {
                account: AccountSnapshot {
                    buying_power,
                    cash: buying_power,
                    portfolio_value: buying_power,
                    last_equity: buying_power,
                    day_trade_count: 0,
                },
                positions: Vec::new(),
                prices: HashMap::new(),
                orders: Mutex::new(Vec::new()),
                reject: Vec::new(),
            }
        }

        fn with_position(mut self, symbol: &str, qty: Decimal) -> Self {
            self.positions.push(BrokerPosition {
                symbol: symbol.to_string(),
                qty,
                market_value: dec!(0),
                avg_entry_price: dec!(0),
                unrealized_pl: dec!(0),
            });
            self
        }

        fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
            self.prices.insert(symbol.to_string(), price);
            self
        }

        fn rejecting(mut self, symbol: &str) -> Self {
            self.reject.push(symbol.to_string());
            self
        }

        fn orders(&self) -> Vec<SubmittedOrder> {
            self.orders.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerageClient for MockBroker {
        async fn account(&self) -> BrokerResult<AccountSnapshot> {
            Ok(self.account.clone())
        }

        async fn open_positions(&self) -> BrokerResult<Vec<BrokerPosition>> {
            Ok(self.positions.clone())
        }

        async fn latest_price(&self, symbol: &str) -> BrokerResult<Decimal> {
            self.prices
                .get(symbol)
                .copied()
                .ok_or_else(|| BrokerError::Quote {
                    symbol: symbol.to_string(),
                    reason: "no quote".to_string(),
                })
        }

        async fn submit_market_order(
            &self,
            symbol: &str,
            qty: Decimal,
            side: OrderSide,
        ) -> BrokerResult<OrderReceipt> {
            if self.reject.iter().any(|s| s == symbol) {
                return Err(BrokerError::Order {
                    symbol: symbol.to_string(),
                    reason: "rejected".to_string(),
                });
            }

            let mut orders = self.orders.lock().unwrap();
            orders.push(SubmittedOrder {
                symbol: symbol.to_string(),
                qty,
                side,
            });

            Ok(OrderReceipt {
                order_id: format!("order-{}", orders.len()),
                symbol: symbol.to_string(),
                qty,
                side,
                submitted_at: Utc::now(),
            })
        }
    }

    fn instant_settings(top_n: usize) -> RebalanceSettings {
        RebalanceSettings {
            top_n,
            reserve_fraction: dec!(0.9),
            settle_delay: Duration::ZERO,
        }
    }

    fn rebalancer(
        broker: MockBroker,
        tmp: &TempDir,
        settings: RebalanceSettings,
    ) -> (Rebalancer<MockBroker>, Arc<MockBroker>) {
        let broker = Arc::new(broker);
        let controller = Rebalancer::new(
            broker.clone(),
            RankingStore::new(tmp.path()),
            TradeLedger::new(tmp.path()),
            settings,
        );
        (controller, broker)
    }

    fn publish(tmp: &TempDir, entries: &[(&str, f64)]) {
        let ranking: Vec<RankingEntry> = entries
            .iter()
            .map(|(t, s)| RankingEntry {
                ticker: t.to_string(),
                sharpe_ratio: *s,
            })
            .collect();
        RankingStore::new(tmp.path()).save_ranking(&ranking).unwrap();
    }

    #[tokio::test]
    async fn liquidate_sells_only_positive_quantities() {
        let tmp = TempDir::new().unwrap();
        let broker = MockBroker::new(dec!(10000))
            .with_position("AAPL", dec!(10))
            .with_position("MSFT", dec!(-5));
        let (controller, broker) = rebalancer(broker, &tmp, instant_settings(10));

        let sold = controller.liquidate_all().await.unwrap();
        assert_eq!(sold, 1);

        let orders = broker.orders();
        assert_eq!(
            orders,
            vec![SubmittedOrder {
                symbol: "AAPL".to_string(),
                qty: dec!(10),
                side: OrderSide::Sell,
            }]
        );
    }

    #[tokio::test]
    async fn liquidate_clears_the_position_book() {
        let tmp = TempDir::new().unwrap();
        let ledger = TradeLedger::new(tmp.path());
        let mut stale = PositionBook::new();
        stale.insert(
            "OLD".to_string(),
            Position {
                quantity: dec!(1),
                expected_price: dec!(5),
                sharpe_ratio: 0.1,
                order_id: "old".to_string(),
                timestamp: Utc::now(),
            },
        );
        ledger.save_positions(&stale).unwrap();

        let broker = MockBroker::new(dec!(10000)).with_position("OLD", dec!(1));
        let (controller, _) = rebalancer(broker, &tmp, instant_settings(10));

        controller.liquidate_all().await.unwrap();
        assert!(ledger.load_positions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failed_sell_does_not_stop_the_others() {
        let tmp = TempDir::new().unwrap();
        let broker = MockBroker::new(dec!(10000))
            .with_position("BAD", dec!(4))
            .with_position("GOOD", dec!(7))
            .rejecting("BAD");
        let (controller, broker) = rebalancer(broker, &tmp, instant_settings(10));

        let sold = controller.liquidate_all().await.unwrap();
        assert_eq!(sold, 1);
        assert_eq!(broker.orders()[0].symbol, "GOOD");
    }

    #[tokio::test]
    async fn allocation_sizes_positions_from_reserved_buying_power() {
        let tmp = TempDir::new().unwrap();
        publish(&tmp, &[("AAPL", 2.0)]);

        // 10000 * 0.9 / 10 = 900 per symbol; floor(900 / 87.30) = 10.
        let broker = MockBroker::new(dec!(10000)).with_price("AAPL", dec!(87.30));
        let (controller, broker) = rebalancer(broker, &tmp, instant_settings(10));

        let bought = controller.allocate_top().await.unwrap();
        assert_eq!(bought, 1);

        let orders = broker.orders();
        assert_eq!(
            orders,
            vec![SubmittedOrder {
                symbol: "AAPL".to_string(),
                qty: dec!(10),
                side: OrderSide::Buy,
            }]
        );

        let book = TradeLedger::new(tmp.path()).load_positions().unwrap();
        let position = &book["AAPL"];
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.expected_price, dec!(87.30));
        assert_eq!(position.sharpe_ratio, 2.0);
    }

    #[tokio::test]
    async fn zero_quantity_symbols_are_skipped_silently() {
        let tmp = TempDir::new().unwrap();
        publish(&tmp, &[("PRICY", 1.0)]);

        // 555 * 0.9 / 10 = 49.95 per symbol, below the 120 price.
        let broker = MockBroker::new(dec!(555)).with_price("PRICY", dec!(120));
        let (controller, broker) = rebalancer(broker, &tmp, instant_settings(10));

        let bought = controller.allocate_top().await.unwrap();
        assert_eq!(bought, 0);
        assert!(broker.orders().is_empty());
        assert!(TradeLedger::new(tmp.path())
            .load_positions()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn allocation_without_a_ranking_aborts() {
        let tmp = TempDir::new().unwrap();
        let broker = MockBroker::new(dec!(10000));
        let (controller, _) = rebalancer(broker, &tmp, instant_settings(10));

        assert!(controller.allocate_top().await.is_err());
    }

    #[tokio::test]
    async fn allocation_buys_in_ranking_order_up_to_top_n() {
        let tmp = TempDir::new().unwrap();
        publish(&tmp, &[("A", 3.0), ("B", 2.0), ("C", 1.0)]);

        let broker = MockBroker::new(dec!(10000))
            .with_price("A", dec!(10))
            .with_price("B", dec!(10))
            .with_price("C", dec!(10));
        let (controller, broker) = rebalancer(broker, &tmp, instant_settings(2));

        let bought = controller.allocate_top().await.unwrap();
        assert_eq!(bought, 2);

        let symbols: Vec<String> = broker.orders().iter().map(|o| o.symbol.clone()).collect();
        assert_eq!(symbols, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn book_holds_exactly_this_cycles_buys() {
        let tmp = TempDir::new().unwrap();
        publish(&tmp, &[("NEW", 1.5)]);

        let ledger = TradeLedger::new(tmp.path());
        let mut stale = PositionBook::new();
        stale.insert(
            "STALE".to_string(),
            Position {
                quantity: dec!(2),
                expected_price: dec!(50),
                sharpe_ratio: 0.4,
                order_id: "old".to_string(),
                timestamp: Utc::now(),
            },
        );
        ledger.save_positions(&stale).unwrap();

        let broker = MockBroker::new(dec!(10000)).with_price("NEW", dec!(30));
        let (controller, _) = rebalancer(broker, &tmp, instant_settings(10));

        controller.allocate_top().await.unwrap();

        let book = ledger.load_positions().unwrap();
        assert_eq!(book.len(), 1);
        assert!(book.contains_key("NEW"));
        assert!(!book.contains_key("STALE"));
    }

    #[tokio::test]
    async fn full_cycle_records_both_trade_reasons() {
        let tmp = TempDir::new().unwrap();
        publish(&tmp, &[("NEW", 1.5)]);

        let broker = MockBroker::new(dec!(10000))
            .with_position("OLD", dec!(3))
            .with_price("NEW", dec!(45));
        let (controller, _) = rebalancer(broker, &tmp, instant_settings(10));

        controller.rebalance().await.unwrap();

        let contents =
            std::fs::read_to_string(tmp.path().join("trades_log.json")).unwrap();
        let trades: Vec<TradeRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].reason, "daily_rebalance");
        assert_eq!(trades[1].reason, "top_ranked_stock");
        assert_eq!(trades[1].expected_price, Some(dec!(45)));
    }
}
