//! Similarity gate
//!
//! Decides per query whether the training corpus holds an example close
//! enough to justify a price. A query qualifies when some training row shares
//! at least `min_category_matches` bucketed categorical values, or when some
//! training description embedding reaches `text_threshold` cosine similarity.

use crate::distance::{max_category_matches, max_text_similarity};
use pricegate_core::{
    Error, FeatureRow, FittedPreprocessor, PipelineConfig, Record, Result, SimilarityDecision,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityGate {
    pub min_category_matches: usize,
    pub text_threshold: f64,
}

/// Training rows that produced the best scores of a decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestMatches {
    pub best_category_row: Option<usize>,
    pub best_text_row: Option<usize>,
}

impl SimilarityGate {
    pub fn new(min_category_matches: usize, text_threshold: f64) -> Self {
        Self {
            min_category_matches,
            text_threshold,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_category_matches, config.text_similarity_threshold)
    }

    /// Check the gate thresholds against a fitted schema
    pub fn validate(&self, fitted: &FittedPreprocessor) -> Result<()> {
        let n_categorical = fitted.schema().n_categorical();
        if self.min_category_matches > n_categorical {
            return Err(Error::InvalidConfig(format!(
                "min_category_matches {} exceeds the {} categorical fields",
                self.min_category_matches, n_categorical
            )));
        }
        if !(-1.0..=1.0).contains(&self.text_threshold) {
            return Err(Error::InvalidConfig(format!(
                "text threshold {} must lie in [-1, 1]",
                self.text_threshold
            )));
        }
        Ok(())
    }

    /// Transform a raw query and decide whether it is close enough to the
    /// training data
    pub fn check(&self, query: &Record, fitted: &FittedPreprocessor) -> SimilarityDecision {
        let row = fitted.transform_one(query);
        self.check_transformed(&row, fitted)
    }

    /// Decide for a query that is already transformed
    pub fn check_transformed(&self, row: &FeatureRow, fitted: &FittedPreprocessor) -> SimilarityDecision {
        let (decision, _) = self.evaluate(row, fitted);
        decision
    }

    /// Like [`Self::check_transformed`], also naming the closest training rows
    pub fn nearest(&self, row: &FeatureRow, fitted: &FittedPreprocessor) -> (SimilarityDecision, NearestMatches) {
        self.evaluate(row, fitted)
    }

    fn evaluate(&self, row: &FeatureRow, fitted: &FittedPreprocessor) -> (SimilarityDecision, NearestMatches) {
        let training = fitted.training_frame();

        let (max_matches, best_category_row) = max_category_matches(
            &row.categories,
            training.rows.iter().map(|r| r.categories.as_slice()),
        );
        let (max_similarity, best_text_row) = max_text_similarity(&row.latent, training.latent());

        let decision = SimilarityDecision::evaluate(
            max_matches,
            max_similarity,
            self.min_category_matches,
            self.text_threshold,
        );
        debug!(
            max_category_matches = decision.max_category_matches,
            max_text_similarity = decision.max_text_similarity,
            is_similar = decision.is_similar,
            "Similarity gate evaluated"
        );

        (
            decision,
            NearestMatches {
                best_category_row,
                best_text_row,
            },
        )
    }
}

impl Default for SimilarityGate {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
