// src/store/mod.rs
pub mod ledger;
pub mod rankings;
