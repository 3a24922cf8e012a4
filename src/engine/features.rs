// src/engine/features.rs
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::PriceSeries;

/// Width of the forward volatility window, in periods.
pub const VOLATILITY_WINDOW: usize = 5;

/// One supervised-learning row: the five OHLCV features plus the two
/// forward-looking targets.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Percentage return realized in the following period
    pub next_period_return: f64,
    /// Standard deviation of the next `VOLATILITY_WINDOW` returns
    pub forward_volatility: f64,
}

impl FeatureRow {
    pub fn features(&self) -> Vec<f64> {
        vec![self.open, self.high, self.low, self.close, self.volume]
    }
}

/// Per-symbol feature/target table with every value defined.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub symbol: String,
    pub rows: Vec<FeatureRow>,
}

/// Sample standard deviation (n-1 denominator).
fn stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

impl FeatureTable {
    /// Build the supervised table from a raw price series.
    ///
    /// Incomplete bars are dropped first. Each remaining bar `t` (with a
    /// defined return) gets `next_period_return = return[t+1]` and
    /// `forward_volatility = stdev(return[t+1 ..= t+5])`; bars near either
    /// edge lacking a return or a full forward window are dropped, so the
    /// output has no undefined value in any column.
    pub fn from_series(series: &PriceSeries, min_rows: usize) -> EngineResult<Self> {
        let bars: Vec<_> = series.bars.iter().filter(|b| b.is_complete()).collect();

        let n = bars.len();
        // returns[t] is defined for t in 1..n
        let mut returns = vec![f64::NAN; n];
        for t in 1..n {
            returns[t] = bars[t].close / bars[t - 1].close - 1.0;
        }

        let mut rows = Vec::new();
        for t in 1..n {
            let window_end = t + VOLATILITY_WINDOW;
            if window_end >= n {
                break;
            }

            rows.push(FeatureRow {
                open: bars[t].open,
                high: bars[t].high,
                low: bars[t].low,
                close: bars[t].close,
                volume: bars[t].volume,
                next_period_return: returns[t + 1],
                forward_volatility: stdev(&returns[t + 1..=window_end]),
            });
        }

        if rows.len() < min_rows {
            return Err(EngineError::InsufficientData(format!(
                "{}: {} valid rows, need at least {}",
                series.symbol,
                rows.len(),
                min_rows
            )));
        }

        Ok(Self {
            symbol: series.symbol.clone(),
            rows,
        })
    }

    /// Feature columns as a row-major matrix.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.features()).collect()
    }

    pub fn return_targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.next_period_return).collect()
    }

    pub fn volatility_targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.forward_volatility).collect()
    }

    /// The most recent feature row, used for scoring.
    pub fn latest_features(&self) -> Vec<f64> {
        self.rows
            .last()
            .map(FeatureRow::features)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Bar;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut series = PriceSeries::new("TEST", "1d");
        for (i, close) in closes.iter().enumerate() {
            series.bars.push(Bar {
                timestamp: start + Duration::days(i as i64),
                open: close * 0.99,
                high: close * 1.01,
                low: close * 0.98,
                close: *close,
                volume: 1_000.0 + i as f64,
            });
        }
        series
    }

    #[test]
    fn every_row_is_fully_defined() {
        let closes: Vec<f64> = (1..=40).map(|i| 100.0 + i as f64).collect();
        let table = FeatureTable::from_series(&series_from_closes(&closes), 10).unwrap();

        for row in &table.rows {
            assert!(row.features().iter().all(|v| v.is_finite()));
            assert!(row.next_period_return.is_finite());
            assert!(row.forward_volatility.is_finite());
        }
    }

    #[test]
    fn table_length_accounts_for_edge_rows() {
        let closes: Vec<f64> = (1..=40).map(|i| 100.0 + i as f64).collect();
        let table = FeatureTable::from_series(&series_from_closes(&closes), 10).unwrap();

        // One row lost to differencing, five to the forward window.
        assert_eq!(table.rows.len(), closes.len() - 1 - VOLATILITY_WINDOW);
    }

    #[test]
    fn forward_volatility_matches_next_five_returns() {
        // 11 closes -> 10 known returns.
        let closes = [
            100.0, 102.0, 101.0, 105.0, 104.0, 108.0, 107.0, 111.0, 110.0, 115.0, 114.0,
        ];
        let mut returns = Vec::new();
        for t in 1..closes.len() {
            returns.push(closes[t] / closes[t - 1] - 1.0);
        }

        let table = FeatureTable::from_series(&series_from_closes(&closes), 1).unwrap();

        // Row 0 corresponds to bar index 1 (return index 0); its targets look
        // at return indices 1..=5.
        let first = &table.rows[0];
        assert_relative_eq!(first.next_period_return, returns[1], epsilon = 1e-12);
        assert_relative_eq!(
            first.forward_volatility,
            stdev(&returns[1..6]),
            epsilon = 1e-12
        );

        // Cross-check the stdev against a hand calculation.
        let window = &returns[1..6];
        let mean = window.iter().sum::<f64>() / 5.0;
        let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 4.0;
        assert_relative_eq!(first.forward_volatility, var.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn nan_bars_are_dropped_not_fatal() {
        let closes: Vec<f64> = (1..=40).map(|i| 100.0 + i as f64).collect();
        let mut series = series_from_closes(&closes);
        series.bars[7].close = f64::NAN;
        series.bars[7].volume = f64::NAN;

        let table = FeatureTable::from_series(&series, 10).unwrap();
        assert_eq!(table.rows.len(), closes.len() - 1 - 1 - VOLATILITY_WINDOW);
        assert!(table
            .rows
            .iter()
            .all(|r| r.features().iter().all(|v| v.is_finite())));
    }

    #[test]
    fn short_series_is_rejected() {
        let closes: Vec<f64> = (1..=12).map(|i| 100.0 + i as f64).collect();
        let err = FeatureTable::from_series(&series_from_closes(&closes), 10).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }
}
