//! End-to-end training flow
//!
//! `load -> fit preprocessor -> train model -> save pair`, the sequence the
//! `pricegate train` command runs.

use pricegate_core::{
    DatasetLoader, FittedPreprocessor, PipelineConfig, Preprocessor, Record, Result,
};
use pricegate_model::{prices_from_records, ModelTrainer, TrainedModel, ValidationMetrics};
use pricegate_storage::{ArtifactManifest, ArtifactStore};
use std::path::Path;
use tracing::info;

/// Everything one training run produces
#[derive(Debug, Clone)]
pub struct TrainedPair {
    pub model: TrainedModel,
    pub preprocessor: FittedPreprocessor,
    pub metrics: ValidationMetrics,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub n_records: usize,
    pub metrics: ValidationMetrics,
    pub manifest: ArtifactManifest,
}

/// Fit the preprocessor and the model on labeled records
pub fn train_records(records: &[Record], config: &PipelineConfig) -> Result<TrainedPair> {
    config.validate()?;
    let prices = prices_from_records(records)?;
    let preprocessor = Preprocessor::new(config.clone()).fit(records)?;
    let (model, metrics) = ModelTrainer::new(config.clone()).train(&preprocessor, &prices)?;
    Ok(TrainedPair {
        model,
        preprocessor,
        metrics,
    })
}

/// Train from a dataset file and store the artifact pair in `out`
pub fn train_from_path<P: AsRef<Path>, Q: AsRef<Path>>(
    data: P,
    out: Q,
    config: &PipelineConfig,
) -> Result<TrainingReport> {
    let data = data.as_ref();
    let records = DatasetLoader::training(config).load_records(data)?;
    info!(path = %data.display(), records = records.len(), "Loaded training data");

    let pair = train_records(&records, config)?;
    let manifest = ArtifactStore::new(out.as_ref()).save(
        &pair.model,
        &pair.preprocessor,
        config,
        Some(&pair.metrics),
    )?;

    Ok(TrainingReport {
        n_records: records.len(),
        metrics: pair.metrics,
        manifest,
    })
}

/// Read query records (no price column needed)
pub fn load_queries<P: AsRef<Path>>(path: P, config: &PipelineConfig) -> Result<Vec<Record>> {
    DatasetLoader::inference(config).load_records(path)
}
