//! # pricegate Model
//!
//! Gradient-boosted regression on `log1p(price)` and the gated predictor.
//!
//! - [`ModelTrainer`] - seeded train/validation split, boosting with early
//!   stopping, validation metrics in price units
//! - [`TrainedModel`] - the fitted tree ensemble
//! - [`PricePredictor`] - transform, gate, then price
//!
//! Categorical columns are split natively on sets of codes; latent columns
//! are split on thresholds.

pub mod gbdt;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod predictor;
pub mod split;
pub mod trainer;
pub mod tree;

pub use gbdt::{BoostedEnsemble, GradientBooster};
pub use matrix::{Column, FeatureMatrix, FeatureValue};
pub use metrics::ValidationMetrics;
pub use model::TrainedModel;
pub use predictor::{Prediction, PricePredictor};
pub use split::{train_validation_split, TrainValidationSplit};
pub use trainer::{prices_from_records, ModelTrainer};
pub use tree::{Node, RegressionTree, SplitRule, TreeBuilder};
