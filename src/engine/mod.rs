// src/engine/mod.rs
pub mod features;
pub mod model;
pub mod ranking;
