//! Pipeline configuration
//!
//! Every static threshold and hyperparameter of the pipeline lives in
//! [`PipelineConfig`]. Values load from a JSON document; keys that are left
//! out fall back to the defaults below.

use crate::record::CATEGORICAL_FIELDS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_REQUIRED_COLUMNS: [&str; 7] = [
    "product_type",
    "material",
    "color",
    "style",
    "region",
    "description",
    "price",
];

/// Name of the target column, dropped from the schema at inference time
pub const PRICE_COLUMN: &str = "price";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Columns the training table must carry, in output order
    pub required_columns: Vec<String>,
    /// Values seen fewer times than this are bucketed into "other"
    pub min_category_frequency: usize,
    pub tfidf_max_features: usize,
    /// Inclusive n-gram range for the TF-IDF vectorizer
    pub tfidf_ngram_range: (usize, usize),
    /// Requested latent width; clamped on small corpora
    pub embedding_size: usize,
    pub svd_oversamples: usize,
    pub svd_power_iterations: usize,
    pub min_category_matches: usize,
    pub text_similarity_threshold: f64,
    pub validation_ratio: f64,
    pub random_seed: u64,
    pub booster: BoosterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            required_columns: DEFAULT_REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            min_category_frequency: 2,
            tfidf_max_features: 5000,
            tfidf_ngram_range: (1, 2),
            embedding_size: 50,
            svd_oversamples: 10,
            svd_power_iterations: 5,
            min_category_matches: 3,
            text_similarity_threshold: 0.60,
            validation_ratio: 0.2,
            random_seed: 42,
            booster: BoosterConfig::default(),
        }
    }
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoosterConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub min_samples_leaf: usize,
    pub lambda_l2: f64,
    pub min_split_gain: f64,
    /// Nodes with at most this many categories use one-vs-rest splits
    pub max_cat_onehot: usize,
    pub cat_smooth: f64,
    pub early_stopping_rounds: usize,
    /// Log validation loss every this many rounds (0 disables)
    pub log_period: usize,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            n_estimators: 10_000,
            learning_rate: 0.05,
            max_leaves: 31,
            min_samples_leaf: 20,
            lambda_l2: 0.0,
            min_split_gain: 0.0,
            max_cat_onehot: 4,
            cat_smooth: 10.0,
            early_stopping_rounds: 100,
            log_period: 100,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.required_columns.is_empty() {
            return Err(Error::InvalidConfig("required_columns cannot be empty".into()));
        }
        if self.min_category_frequency == 0 {
            return Err(Error::InvalidConfig("min_category_frequency must be at least 1".into()));
        }
        let (lo, hi) = self.tfidf_ngram_range;
        if lo == 0 || lo > hi {
            return Err(Error::InvalidConfig(format!(
                "tfidf_ngram_range ({lo}, {hi}) must satisfy 1 <= min <= max"
            )));
        }
        if self.tfidf_max_features == 0 || self.embedding_size == 0 {
            return Err(Error::InvalidConfig(
                "tfidf_max_features and embedding_size must be positive".into(),
            ));
        }
        if !self.validation_ratio.is_finite() || self.validation_ratio <= 0.0 || self.validation_ratio >= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "validation_ratio {} must lie in (0, 1)",
                self.validation_ratio
            )));
        }
        if !(-1.0..=1.0).contains(&self.text_similarity_threshold) {
            return Err(Error::InvalidConfig(format!(
                "text_similarity_threshold {} must lie in [-1, 1]",
                self.text_similarity_threshold
            )));
        }
        if self.min_category_matches > CATEGORICAL_FIELDS.len() {
            return Err(Error::InvalidConfig(format!(
                "min_category_matches {} exceeds the {} categorical fields",
                self.min_category_matches,
                CATEGORICAL_FIELDS.len()
            )));
        }
        self.booster.validate()
    }

    /// Required columns minus the price target
    pub fn inference_columns(&self) -> Vec<String> {
        self.required_columns
            .iter()
            .filter(|c| c.as_str() != PRICE_COLUMN)
            .cloned()
            .collect()
    }
}

impl BoosterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidConfig("booster.n_estimators must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig("booster.learning_rate must be positive".into()));
        }
        if self.max_leaves < 2 {
            return Err(Error::InvalidConfig("booster.max_leaves must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidConfig("booster.min_samples_leaf must be positive".into()));
        }
        if self.lambda_l2 < 0.0 || self.cat_smooth < 0.0 {
            return Err(Error::InvalidConfig(
                "booster.lambda_l2 and booster.cat_smooth cannot be negative".into(),
            ));
        }
        if self.early_stopping_rounds == 0 {
            return Err(Error::InvalidConfig(
                "booster.early_stopping_rounds must be positive".into(),
            ));
        }
        Ok(())
    }
}
