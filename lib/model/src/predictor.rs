//! Gated price prediction
//!
//! A [`PricePredictor`] owns one loaded model/preprocessor pair. Every query
//! is transformed once, checked by the [`SimilarityGate`] and only then
//! priced. Rejections are returned as [`Error::InsufficientSimilarity`] with
//! the gate diagnostics; no price accompanies them.

use crate::model::TrainedModel;
use pricegate_core::{Error, FittedPreprocessor, Record, Result, SimilarityDecision};
use pricegate_similarity::SimilarityGate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub price: f64,
    pub decision: SimilarityDecision,
}

#[derive(Debug, Clone)]
pub struct PricePredictor {
    model: TrainedModel,
    preprocessor: FittedPreprocessor,
    gate: SimilarityGate,
}

impl PricePredictor {
    /// Pair a model with the preprocessor it was trained on
    pub fn new(model: TrainedModel, preprocessor: FittedPreprocessor, gate: SimilarityGate) -> Result<Self> {
        model.check_schema(&preprocessor.schema())?;
        gate.validate(&preprocessor)?;
        info!(
            trees = model.n_trees(),
            training_rows = preprocessor.training_frame().len(),
            min_category_matches = gate.min_category_matches,
            text_threshold = gate.text_threshold,
            "Price predictor ready"
        );
        Ok(Self {
            model,
            preprocessor,
            gate,
        })
    }

    pub fn predict(&self, query: &Record) -> Result<Prediction> {
        let row = self.preprocessor.transform_one(query);
        let decision = self.gate.check_transformed(&row, &self.preprocessor);
        if !decision.is_similar {
            debug!(
                product_type = %query.product_type,
                max_category_matches = decision.max_category_matches,
                max_text_similarity = decision.max_text_similarity,
                "Query rejected by similarity gate"
            );
            return Err(Error::InsufficientSimilarity(decision));
        }
        let price = self.model.predict_price(&row)?;
        Ok(Prediction { price, decision })
    }

    /// Predict many records in parallel; results keep input order
    pub fn predict_batch(&self, queries: &[Record]) -> Vec<Result<Prediction>> {
        queries.par_iter().map(|q| self.predict(q)).collect()
    }

    /// Gate decision only, without pricing
    pub fn check(&self, query: &Record) -> SimilarityDecision {
        self.gate.check(query, &self.preprocessor)
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn gate(&self) -> &SimilarityGate {
        &self.gate
    }
}
