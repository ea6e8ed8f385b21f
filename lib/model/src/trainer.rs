//! Model training
//!
//! Splits the fitted training frame into train/validation partitions, boosts
//! on `log1p(price)` and reports validation metrics in price units.

use crate::gbdt::GradientBooster;
use crate::metrics::ValidationMetrics;
use crate::model::TrainedModel;
use crate::split::train_validation_split;
use pricegate_core::{
    Error, FeatureFrame, FeatureRow, FittedPreprocessor, PipelineConfig, Record, Result,
};
use tracing::info;

/// Target prices of labeled records, in record order
pub fn prices_from_records(records: &[Record]) -> Result<Vec<f64>> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| match record.price {
            Some(price) if price.is_finite() && price > 0.0 => Ok(price),
            Some(price) => Err(Error::InvalidRecord {
                row,
                reason: format!("price {price} must be a positive number"),
            }),
            None => Err(Error::InvalidRecord {
                row,
                reason: "price is missing".to_string(),
            }),
        })
        .collect()
}

fn gather<'a>(frame: &'a FeatureFrame, targets: &[f64], idx: &[usize]) -> (Vec<&'a FeatureRow>, Vec<f64>) {
    idx.iter().map(|&i| (&frame.rows[i], targets[i])).unzip()
}

#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: PipelineConfig,
}

impl ModelTrainer {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fit the regressor on the training frame of `fitted`, one price per row
    pub fn train(
        &self,
        fitted: &FittedPreprocessor,
        prices: &[f64],
    ) -> Result<(TrainedModel, ValidationMetrics)> {
        let frame = fitted.training_frame();
        if prices.len() != frame.len() {
            return Err(Error::DegenerateTrainingSet(format!(
                "{} prices for {} training rows",
                prices.len(),
                frame.len()
            )));
        }
        self.config.booster.validate()?;

        let split = train_validation_split(
            frame.len(),
            self.config.validation_ratio,
            self.config.random_seed,
        )?;

        let targets: Vec<f64> = prices.iter().map(|p| p.ln_1p()).collect();
        let (train_rows, train_targets) = gather(frame, &targets, &split.train);
        let (valid_rows, valid_targets) = gather(frame, &targets, &split.validation);

        info!(
            n_train = train_rows.len(),
            n_validation = valid_rows.len(),
            "Training price model"
        );

        let schema = fitted.schema();
        let ensemble = GradientBooster::new(&self.config.booster).fit(
            &schema,
            &train_rows,
            &train_targets,
            &valid_rows,
            &valid_targets,
        );

        let actual: Vec<f64> = split.validation.iter().map(|&i| prices[i]).collect();
        let predicted: Vec<f64> = valid_rows
            .iter()
            .map(|row| ensemble.predict(row).exp_m1())
            .collect();
        let metrics = ValidationMetrics::compute(
            &actual,
            &predicted,
            train_rows.len(),
            ensemble.best_iteration,
        );

        info!(
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            best_iteration = metrics.best_iteration,
            "Validation metrics"
        );

        let model = TrainedModel::new(schema, ensemble.base_score, ensemble.trees, ensemble.best_iteration);
        Ok((model, metrics))
    }
}
