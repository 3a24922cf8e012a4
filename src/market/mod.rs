// src/market/mod.rs
pub mod client;
pub mod yahoo;
