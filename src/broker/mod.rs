// src/broker/mod.rs
pub mod alpaca;
pub mod client;
