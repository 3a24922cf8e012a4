// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;

/// Rebalancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Brokerage API credentials
    pub broker: BrokerConfig,

    /// Market data provider configuration
    pub market: MarketConfig,

    /// Signal generation configuration
    pub signal: SignalConfig,

    /// Rebalancing configuration
    pub trading: TradingConfig,

    /// Shared filesystem artifacts
    pub storage: StorageConfig,

    /// Stage sequencing configuration
    pub runner: RunnerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Brokerage API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// API key
    pub api_key: String,

    /// API secret
    pub api_secret: String,

    /// Trading API base URL (paper endpoint by default)
    pub base_url: String,

    /// Market data API base URL
    pub data_url: String,
}

/// Market data provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Price history base URL
    pub chart_url: String,

    /// Reference list of index-member tickers (CSV)
    pub universe_url: String,
}

/// Signal generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Price history lookback (e.g. "1y")
    pub lookback: String,

    /// Bar interval (e.g. "1d")
    pub interval: String,

    /// Number of top-scored symbols to publish
    pub top_n: usize,

    /// Minimum valid feature rows per symbol
    pub min_rows: usize,

    /// Chronological test partition fraction
    pub test_fraction: f64,

    /// Trees per regression ensemble
    pub n_estimators: usize,

    /// Ensemble RNG seed
    pub seed: u64,
}

/// Rebalancing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Number of positions to target
    pub top_n: usize,

    /// Fraction of buying power deployed (remainder held back)
    pub reserve_fraction: Decimal,

    /// Seconds to wait after sells before reading buying power
    pub settle_delay_secs: u64,
}

/// Shared filesystem artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding rankings, holdings, positions and the trade log
    pub shared_data_dir: String,
}

/// Stage sequencing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum seconds to wait for a ranking file to appear
    pub ranking_wait_secs: u64,

    /// Seconds between ranking file polls
    pub poll_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let broker = BrokerConfig {
            api_key: env::var("APCA_API_KEY_ID").map_err(|_| {
                AppError::Config("Missing APCA_API_KEY_ID environment variable".to_string())
            })?,
            api_secret: env::var("APCA_API_SECRET_KEY").map_err(|_| {
                AppError::Config("Missing APCA_API_SECRET_KEY environment variable".to_string())
            })?,
            base_url: env_or("APCA_API_BASE_URL", "https://paper-api.alpaca.markets"),
            data_url: env_or("APCA_DATA_URL", "https://data.alpaca.markets"),
        };

        let market = MarketConfig {
            chart_url: env_or(
                "MARKET_CHART_URL",
                "https://query1.finance.yahoo.com/v8/finance/chart",
            ),
            universe_url: env_or(
                "UNIVERSE_URL",
                "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/main/data/constituents.csv",
            ),
        };

        let signal = SignalConfig {
            lookback: env_or("SIGNAL_LOOKBACK", "1y"),
            interval: env_or("SIGNAL_INTERVAL", "1d"),
            top_n: env_parse("TOP_N", 10),
            min_rows: env_parse("SIGNAL_MIN_ROWS", 10),
            test_fraction: env_parse("SIGNAL_TEST_FRACTION", 0.2),
            n_estimators: env_parse("SIGNAL_N_ESTIMATORS", 100),
            seed: env_parse("SIGNAL_SEED", 42),
        };

        let trading = TradingConfig {
            top_n: env_parse("TOP_N", 10),
            reserve_fraction: env::var("RESERVE_FRACTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Decimal::new(9, 1)),
            settle_delay_secs: env_parse("SETTLE_DELAY_SECS", 30),
        };

        let storage = StorageConfig {
            shared_data_dir: env_or("SHARED_DATA_DIR", "shared_data"),
        };

        let runner = RunnerConfig {
            ranking_wait_secs: env_parse("RANKING_WAIT_SECS", 60),
            poll_interval_secs: env_parse("RANKING_POLL_SECS", 5),
        };

        let logging = LoggingConfig {
            level: env_or("LOG_LEVEL", "info"),
            to_file: env_parse("LOG_TO_FILE", false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            broker,
            market,
            signal,
            trading,
            storage,
            runner,
            logging,
        })
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.init();

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig {
                api_key: "".to_string(),
                api_secret: "".to_string(),
                base_url: "https://paper-api.alpaca.markets".to_string(),
                data_url: "https://data.alpaca.markets".to_string(),
            },
            market: MarketConfig {
                chart_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
                universe_url:
                    "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/main/data/constituents.csv"
                        .to_string(),
            },
            signal: SignalConfig {
                lookback: "1y".to_string(),
                interval: "1d".to_string(),
                top_n: 10,
                min_rows: 10,
                test_fraction: 0.2,
                n_estimators: 100,
                seed: 42,
            },
            trading: TradingConfig {
                top_n: 10,
                reserve_fraction: Decimal::new(9, 1),
                settle_delay_secs: 30,
            },
            storage: StorageConfig {
                shared_data_dir: "shared_data".to_string(),
            },
            runner: RunnerConfig {
                ranking_wait_secs: 60,
                poll_interval_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
