use crate::tree::RegressionTree;
use pricegate_core::{Error, FeatureRow, FeatureSchema, Result};
use serde::{Deserialize, Serialize};

/// Boosted tree ensemble over a fixed feature schema, predicting `log1p(price)`.
/// Leaf values are already scaled by the learning rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    schema: FeatureSchema,
    base_score: f64,
    trees: Vec<RegressionTree>,
    best_iteration: usize,
}

impl TrainedModel {
    pub fn new(
        schema: FeatureSchema,
        base_score: f64,
        trees: Vec<RegressionTree>,
        best_iteration: usize,
    ) -> Self {
        Self {
            schema,
            base_score,
            trees,
            best_iteration,
        }
    }

    /// Raw model output in log space
    pub fn infer_log(&self, row: &FeatureRow) -> Result<f64> {
        self.check_row(row)?;
        Ok(self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
    }

    /// Prediction in price units
    pub fn predict_price(&self, row: &FeatureRow) -> Result<f64> {
        Ok(self.infer_log(row)?.exp_m1())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn best_iteration(&self) -> usize {
        self.best_iteration
    }

    /// Check that the model reads the same columns a preprocessor produces
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        if &self.schema != schema {
            return Err(Error::ArtifactLoadMismatch(format!(
                "model expects {} categorical + {} latent columns {:?}, preprocessor produces {} + {} {:?}",
                self.schema.n_categorical(),
                self.schema.latent_width,
                self.schema.cardinalities,
                schema.n_categorical(),
                schema.latent_width,
                schema.cardinalities,
            )));
        }
        let n_categorical = self.schema.n_categorical();
        let n_features = self.schema.n_features();
        for tree in &self.trees {
            if tree.max_feature().is_some_and(|f| f >= n_features) || !tree.rules_match_layout(n_categorical) {
                return Err(Error::ArtifactLoadMismatch(
                    "model tree reads a column outside its feature schema".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn check_row(&self, row: &FeatureRow) -> Result<()> {
        if row.categories.len() != self.schema.n_categorical() {
            return Err(Error::InvalidDimension {
                expected: self.schema.n_categorical(),
                actual: row.categories.len(),
            });
        }
        if row.latent.len() != self.schema.latent_width {
            return Err(Error::InvalidDimension {
                expected: self.schema.latent_width,
                actual: row.latent.len(),
            });
        }
        Ok(())
    }
}
