// src/trading/mod.rs
pub mod rebalance;
