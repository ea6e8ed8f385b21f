//! Gradient boosting on squared error
//!
//! The ensemble starts from the mean training target and adds one
//! [`RegressionTree`] per round, fitted to the residual gradients. The
//! validation loss is tracked each round; training stops once it has not
//! improved for `early_stopping_rounds` and the ensemble is cut back to the
//! best round. Round 0 (the base score alone) is a valid best.

use crate::matrix::FeatureMatrix;
use crate::metrics::mean_squared_error;
use crate::tree::{RegressionTree, TreeBuilder};
use pricegate_core::{BoosterConfig, FeatureRow, FeatureSchema};
use tracing::{debug, info, warn};

/// Result of a boosting run
#[derive(Debug, Clone)]
pub struct BoostedEnsemble {
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
    /// Trees kept; equals `trees.len()`
    pub best_iteration: usize,
    /// Rounds actually run before stopping
    pub rounds: usize,
    pub best_validation_loss: f64,
}

impl BoostedEnsemble {
    pub fn predict(&self, row: &FeatureRow) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

pub struct GradientBooster<'a> {
    config: &'a BoosterConfig,
}

impl<'a> GradientBooster<'a> {
    pub fn new(config: &'a BoosterConfig) -> Self {
        Self { config }
    }

    pub fn fit(
        &self,
        schema: &FeatureSchema,
        train_rows: &[&FeatureRow],
        train_targets: &[f64],
        valid_rows: &[&FeatureRow],
        valid_targets: &[f64],
    ) -> BoostedEnsemble {
        let config = self.config;
        let base_score = if train_targets.is_empty() {
            0.0
        } else {
            train_targets.iter().sum::<f64>() / train_targets.len() as f64
        };

        let matrix = FeatureMatrix::from_rows(train_rows, schema);
        let builder = TreeBuilder::new(&matrix, schema.n_categorical(), config);

        let mut train_pred = vec![base_score; train_rows.len()];
        let mut valid_pred = vec![base_score; valid_rows.len()];
        let hess = vec![1.0; train_rows.len()];

        let mut trees = Vec::new();
        let mut best_loss = mean_squared_error(valid_targets, &valid_pred);
        let mut best_iteration = 0;
        let mut rounds = 0;

        debug!(base_score, initial_valid_l2 = best_loss, "Boosting started");

        for round in 1..=config.n_estimators {
            let grad: Vec<f64> = train_pred
                .iter()
                .zip(train_targets)
                .map(|(p, y)| p - y)
                .collect();

            let tree = builder.build(&grad, &hess);
            if tree.n_leaves() < 2 {
                warn!(round, "Stopped training, no further splits meet the split requirements");
                break;
            }

            for (p, row) in train_pred.iter_mut().zip(train_rows) {
                *p += tree.predict(row);
            }
            for (p, row) in valid_pred.iter_mut().zip(valid_rows) {
                *p += tree.predict(row);
            }
            trees.push(tree);
            rounds = round;

            let loss = mean_squared_error(valid_targets, &valid_pred);
            if config.log_period > 0 && round % config.log_period == 0 {
                info!(
                    round,
                    train_l2 = mean_squared_error(train_targets, &train_pred),
                    valid_l2 = loss,
                    "Boosting progress"
                );
            }

            if loss < best_loss {
                best_loss = loss;
                best_iteration = round;
            } else if round - best_iteration >= config.early_stopping_rounds {
                info!(best_iteration, valid_l2 = best_loss, "Early stopping");
                break;
            }
        }

        trees.truncate(best_iteration);
        info!(
            rounds,
            best_iteration,
            valid_l2 = best_loss,
            "Boosting finished"
        );

        BoostedEnsemble {
            base_score,
            trees,
            best_iteration,
            rounds,
            best_validation_loss: best_loss,
        }
    }
}
