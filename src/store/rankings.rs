// src/store/rankings.rs
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::RankingEntry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const RANKING_PREFIX: &str = "rankings_";
const HOLDINGS_FILE: &str = "current_holdings.json";

/// Holdings snapshot value: symbol -> { sharpe_ratio }.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingEntry {
    pub sharpe_ratio: f64,
}

/// Timestamped-file publication channel between the signal engine and the
/// rebalancer. Each ranking is an immutable whole-file write named
/// `rankings_<YYYYMMDD_HHMMSS>.json`; "latest" is the file with the greatest
/// timestamp suffix. No locking: a reader racing a writer sees an older
/// complete file, never a partial one.
#[derive(Debug, Clone)]
pub struct RankingStore {
    dir: PathBuf,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let contents = serde_json::to_string_pretty(value).map_err(|e| StoreError::Write {
        path: path.display().to_string(),
        reason: format!("{}", e),
    })?;

    fs::write(path, contents).map_err(|e| StoreError::Write {
        path: path.display().to_string(),
        reason: format!("{}", e),
    })
}

impl RankingStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Write {
            path: self.dir.display().to_string(),
            reason: format!("{}", e),
        })
    }

    /// Publish a new immutable ranking file; returns its path.
    pub fn save_ranking(&self, ranking: &[RankingEntry]) -> StoreResult<PathBuf> {
        self.ensure_dir()?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}{}.json", RANKING_PREFIX, timestamp));
        write_json(&path, &ranking)?;

        Ok(path)
    }

    /// Overwrite the redundant holdings snapshot (symbol -> sharpe ratio).
    pub fn save_holdings(&self, ranking: &[RankingEntry]) -> StoreResult<()> {
        self.ensure_dir()?;

        let holdings: BTreeMap<&str, HoldingEntry> = ranking
            .iter()
            .map(|e| {
                (
                    e.ticker.as_str(),
                    HoldingEntry {
                        sharpe_ratio: e.sharpe_ratio,
                    },
                )
            })
            .collect();

        write_json(&self.dir.join(HOLDINGS_FILE), &holdings)
    }

    fn ranking_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(RANKING_PREFIX) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();

        // The suffix is second-resolution creation time, so name order is
        // creation order.
        files.sort();
        files
    }

    /// True once at least one ranking has been published.
    pub fn has_rankings(&self) -> bool {
        !self.ranking_files().is_empty()
    }

    /// Load the most recently published ranking. An absent ranking is an
    /// explicit `NoRankings` error, distinct from a published empty ranking.
    pub fn load_latest(&self) -> StoreResult<Vec<RankingEntry>> {
        let latest = self
            .ranking_files()
            .pop()
            .ok_or_else(|| StoreError::NoRankings(self.dir.display().to_string()))?;

        let contents = fs::read_to_string(&latest).map_err(|e| StoreError::Read {
            path: latest.display().to_string(),
            reason: format!("{}", e),
        })?;

        let ranking = serde_json::from_str(&contents).map_err(|e| StoreError::Read {
            path: latest.display().to_string(),
            reason: format!("{}", e),
        })?;

        log::info!("Loaded rankings from {}", latest.display());
        Ok(ranking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(ticker: &str, score: f64) -> RankingEntry {
        RankingEntry {
            ticker: ticker.to_string(),
            sharpe_ratio: score,
        }
    }

    fn write_ranking_named(store: &RankingStore, suffix: &str, ranking: &[RankingEntry]) {
        fs::create_dir_all(store.dir()).unwrap();
        let path = store.dir().join(format!("rankings_{}.json", suffix));
        fs::write(&path, serde_json::to_string(ranking).unwrap()).unwrap();
    }

    #[test]
    fn latest_is_the_greatest_timestamp() {
        let tmp = TempDir::new().unwrap();
        let store = RankingStore::new(tmp.path());

        write_ranking_named(&store, "20240101_000000", &[entry("OLD", 1.0)]);
        write_ranking_named(&store, "20240301_000000", &[entry("NEW", 3.0)]);
        write_ranking_named(&store, "20240201_000000", &[entry("MID", 2.0)]);

        let latest = store.load_latest().unwrap();
        assert_eq!(latest, vec![entry("NEW", 3.0)]);
    }

    #[test]
    fn missing_rankings_is_an_explicit_signal() {
        let tmp = TempDir::new().unwrap();
        let store = RankingStore::new(tmp.path());

        assert!(!store.has_rankings());
        assert!(matches!(
            store.load_latest().unwrap_err(),
            StoreError::NoRankings(_)
        ));
    }

    #[test]
    fn empty_ranking_is_not_no_data() {
        let tmp = TempDir::new().unwrap();
        let store = RankingStore::new(tmp.path());

        store.save_ranking(&[]).unwrap();
        assert!(store.has_rankings());
        assert_eq!(store.load_latest().unwrap(), Vec::new());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = RankingStore::new(tmp.path());

        let ranking = vec![entry("AAPL", 1.5), entry("MSFT", 0.7)];
        let path = store.save_ranking(&ranking).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("rankings_"));

        assert_eq!(store.load_latest().unwrap(), ranking);
    }

    #[test]
    fn holdings_snapshot_maps_symbol_to_score() {
        let tmp = TempDir::new().unwrap();
        let store = RankingStore::new(tmp.path());

        store
            .save_holdings(&[entry("AAPL", 1.5), entry("MSFT", 0.7)])
            .unwrap();

        let contents = fs::read_to_string(tmp.path().join("current_holdings.json")).unwrap();
        let parsed: BTreeMap<String, HoldingEntry> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["AAPL"].sharpe_ratio, 1.5);
    }
}
