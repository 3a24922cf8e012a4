// src/lib.rs
// Main library module declarations

pub mod broker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod market;
pub mod runner;
pub mod store;
pub mod trading;
