//! Validation metrics, reported in price units

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n_train: usize,
    pub n_validation: usize,
    /// Number of trees kept after early stopping
    pub best_iteration: usize,
}

impl ValidationMetrics {
    /// Compute MAE, RMSE and R² of `predicted` against `actual`
    pub fn compute(
        actual: &[f64],
        predicted: &[f64],
        n_train: usize,
        best_iteration: usize,
    ) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                mae: 0.0,
                rmse: 0.0,
                r2: 0.0,
                n_train,
                n_validation: 0,
                best_iteration,
            };
        }

        let mean = actual[..n].iter().sum::<f64>() / n as f64;
        let (mut abs, mut ss_res, mut ss_tot) = (0.0, 0.0, 0.0);
        for (&y, &p) in actual.iter().zip(predicted) {
            let err = y - p;
            abs += err.abs();
            ss_res += err * err;
            ss_tot += (y - mean) * (y - mean);
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            mae: abs / n as f64,
            rmse: (ss_res / n as f64).sqrt(),
            r2,
            n_train,
            n_validation: n,
            best_iteration,
        }
    }
}

/// Mean squared error, used as the boosting validation loss
pub(crate) fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p) * (y - p))
        .sum();
    sum / actual.len() as f64
}
