// src/store/ledger.rs
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::{PositionBook, TradeRecord};
use std::fs;
use std::path::{Path, PathBuf};

const POSITIONS_FILE: &str = "current_positions.json";
const TRADES_FILE: &str = "trades_log.json";

/// Persisted position book and append-only trade log.
///
/// The position book is overwritten whole on every rebalance and records
/// intent at submission time, not confirmed fills. The trade log grows via
/// read-modify-write of the full array; there is exactly one writer.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    positions_path: PathBuf,
    trades_path: PathBuf,
}

impl TradeLedger {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            positions_path: dir.join(POSITIONS_FILE),
            trades_path: dir.join(TRADES_FILE),
        }
    }

    fn ensure_parent(path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write {
                path: parent.display().to_string(),
                reason: format!("{}", e),
            })?;
        }
        Ok(())
    }

    /// Load the persisted position book; a missing file is an empty book.
    pub fn load_positions(&self) -> StoreResult<PositionBook> {
        let contents = match fs::read_to_string(&self.positions_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PositionBook::new())
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.positions_path.display().to_string(),
                    reason: format!("{}", e),
                })
            }
        };

        serde_json::from_str(&contents).map_err(|e| StoreError::Read {
            path: self.positions_path.display().to_string(),
            reason: format!("{}", e),
        })
    }

    /// Overwrite the position book.
    pub fn save_positions(&self, book: &PositionBook) -> StoreResult<()> {
        Self::ensure_parent(&self.positions_path)?;

        let contents = serde_json::to_string_pretty(book).map_err(|e| StoreError::Write {
            path: self.positions_path.display().to_string(),
            reason: format!("{}", e),
        })?;

        fs::write(&self.positions_path, contents).map_err(|e| StoreError::Write {
            path: self.positions_path.display().to_string(),
            reason: format!("{}", e),
        })
    }

    /// Append one record to the trade log.
    pub fn append_trade(&self, record: TradeRecord) -> StoreResult<()> {
        Self::ensure_parent(&self.trades_path)?;

        let mut trades: Vec<TradeRecord> = match fs::read_to_string(&self.trades_path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StoreError::Read {
                path: self.trades_path.display().to_string(),
                reason: format!("{}", e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.trades_path.display().to_string(),
                    reason: format!("{}", e),
                })
            }
        };

        trades.push(record);

        let contents = serde_json::to_string_pretty(&trades).map_err(|e| StoreError::Write {
            path: self.trades_path.display().to_string(),
            reason: format!("{}", e),
        })?;

        fs::write(&self.trades_path, contents).map_err(|e| StoreError::Write {
            path: self.trades_path.display().to_string(),
            reason: format!("{}", e),
        })
    }
}
