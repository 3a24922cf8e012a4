// src/engine/model.rs
use crate::domain::errors::{EngineError, EngineResult};
use crate::engine::features::FeatureTable;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

/// Score emitted when the volatility model predicts exactly zero, forcing the
/// symbol to the bottom of the ranking instead of dividing by zero.
pub const ZERO_VOLATILITY_SENTINEL: f64 = -999.0;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Training hyperparameters, shared by both regressors.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Trees per ensemble
    pub n_estimators: usize,
    /// RNG seed, fixed for determinism
    pub seed: u64,
    /// Chronological test partition fraction (held out, not evaluated)
    pub test_fraction: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            test_fraction: 0.2,
        }
    }
}

/// Per-feature standardizer fit on the training partition only. The same
/// fitted transform is applied at inference; there is no re-fitting.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> EngineResult<Self> {
        let n = rows.len();
        let width = rows.first().map(Vec::len).ok_or_else(|| {
            EngineError::Training("cannot fit scaler on an empty partition".to_string())
        })?;

        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n as f64;
        }

        let mut scales = vec![0.0; width];
        for row in rows {
            for (s, (v, m)) in scales.iter_mut().zip(row.iter().zip(&means)) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut scales {
            *s = (*s / n as f64).sqrt();
            // Constant column: pass through unscaled
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Ok(Self { means, scales })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

/// The two fitted regressors plus their shared scaler, scoped to one symbol
/// and discarded after the score is produced.
pub struct ModelPair {
    return_model: Forest,
    volatility_model: Forest,
    scaler: StandardScaler,
}

fn fit_forest(
    x: &DenseMatrix<f64>,
    y: &Vec<f64>,
    settings: &ModelSettings,
) -> EngineResult<Forest> {
    RandomForestRegressor::fit(
        x,
        y,
        RandomForestRegressorParameters::default()
            .with_n_trees(settings.n_estimators)
            .with_seed(settings.seed),
    )
    .map_err(|e| EngineError::Training(format!("{:?}", e)))
}

impl ModelPair {
    /// Fit both regressors on the chronological training partition of the
    /// table. The trailing test partition is held out but not evaluated;
    /// scoring uses final-state models on the latest row.
    pub fn fit(table: &FeatureTable, settings: &ModelSettings) -> EngineResult<Self> {
        let features = table.feature_matrix();
        let n = features.len();

        let test_len = (n as f64 * settings.test_fraction).ceil() as usize;
        let train_len = n.saturating_sub(test_len);
        if train_len == 0 {
            return Err(EngineError::InsufficientData(format!(
                "{}: no training rows left after the {}% holdout",
                table.symbol,
                settings.test_fraction * 100.0
            )));
        }

        let scaler = StandardScaler::fit(&features[..train_len])?;
        let x_train = DenseMatrix::from_2d_vec(&scaler.transform(&features[..train_len]))
            .map_err(|e| EngineError::Training(format!("{:?}", e)))?;

        let y_return: Vec<f64> = table.return_targets()[..train_len].to_vec();
        let y_volatility: Vec<f64> = table.volatility_targets()[..train_len].to_vec();

        Ok(Self {
            return_model: fit_forest(&x_train, &y_return, settings)?,
            volatility_model: fit_forest(&x_train, &y_volatility, settings)?,
            scaler,
        })
    }

    /// Score the most recent feature row: predicted next-period return over
    /// predicted near-term volatility.
    pub fn predict_score(&self, table: &FeatureTable) -> EngineResult<f64> {
        let latest = table.latest_features();
        if latest.is_empty() {
            return Err(EngineError::Prediction(format!(
                "{}: empty feature table",
                table.symbol
            )));
        }

        let x = DenseMatrix::from_2d_vec(&vec![self.scaler.transform_row(&latest)])
            .map_err(|e| EngineError::Prediction(format!("{:?}", e)))?;

        let pred_return = self.predict_one(&self.return_model, &x)?;
        let pred_volatility = self.predict_one(&self.volatility_model, &x)?;

        Ok(compute_score(pred_return, pred_volatility))
    }

    fn predict_one(&self, model: &Forest, x: &DenseMatrix<f64>) -> EngineResult<f64> {
        let predictions = model
            .predict(x)
            .map_err(|e| EngineError::Prediction(format!("{:?}", e)))?;

        predictions
            .first()
            .copied()
            .ok_or_else(|| EngineError::Prediction("model returned no predictions".to_string()))
    }
}

/// Sharpe-like ranking score.
pub fn compute_score(pred_return: f64, pred_volatility: f64) -> f64 {
    if pred_volatility == 0.0 {
        return ZERO_VOLATILITY_SENTINEL;
    }
    pred_return / pred_volatility
}
