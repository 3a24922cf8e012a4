// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Signal engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Invalid data format: {0}")]
    Parse(String),

    #[error("No data available for: {0}")]
    NoData(String),

    #[error("Universe fetch error: {0}")]
    Universe(String),
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Account error: {0}")]
    Account(String),

    #[error("Position query error: {0}")]
    Positions(String),

    #[error("Quote error for {symbol}: {reason}")]
    Quote { symbol: String, reason: String },

    #[error("Order error for {symbol}: {reason}")]
    Order { symbol: String, reason: String },

    #[error("Request error: {0}")]
    Request(String),

    #[error("API error: {0}")]
    Api(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Prediction error: {0}")]
    Prediction(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No ranking files found in {0}")]
    NoRankings(String),

    #[error("Read error for {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Write error for {path}: {reason}")]
    Write { path: String, reason: String },
}

// Result type aliases for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type MarketDataResult<T> = Result<T, MarketDataError>;
pub type BrokerResult<T> = Result<T, BrokerError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type StoreResult<T> = Result<T, StoreError>;
