//! Artifact persistence
//!
//! A trained model and its fitted preprocessor are stored side by side as one
//! pair:
//!
//! ```text
//! <dir>/model.bin          gzip(bincode(Blob { pair_id, model }))
//! <dir>/preprocessor.bin   gzip(bincode(Blob { pair_id, preprocessor }))
//! <dir>/manifest.json      version, pair id, checksums, schema, metrics
//! ```
//!
//! Blobs are replaced atomically and the manifest is written last, so a
//! directory either holds a complete pair or fails to load. Loading checks the
//! format version, both checksums, the shared pair id and the feature schema.

use crate::manifest::{
    ArtifactManifest, BlobEntry, FORMAT_VERSION, MANIFEST_FILE, MODEL_FILE, PREPROCESSOR_FILE,
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pricegate_core::{Error, FittedPreprocessor, PipelineConfig, Result};
use pricegate_model::{PricePredictor, TrainedModel, ValidationMetrics};
use pricegate_similarity::SimilarityGate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct Blob<T> {
    pair_id: Uuid,
    payload: T,
}

/// A verified model/preprocessor pair
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub model: TrainedModel,
    pub preprocessor: FittedPreprocessor,
    pub manifest: ArtifactManifest,
}

impl LoadedArtifacts {
    /// Gate configured with the thresholds used at training time
    pub fn gate(&self) -> SimilarityGate {
        SimilarityGate::from_config(&self.manifest.config)
    }

    pub fn into_predictor(self, gate: SimilarityGate) -> Result<PricePredictor> {
        PricePredictor::new(self.model, self.preprocessor, gate)
    }
}

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a model with the preprocessor it was trained on
    pub fn save(
        &self,
        model: &TrainedModel,
        preprocessor: &FittedPreprocessor,
        config: &PipelineConfig,
        metrics: Option<&ValidationMetrics>,
    ) -> Result<ArtifactManifest> {
        let schema = preprocessor.schema();
        if model.schema() != &schema {
            return Err(Error::ArtifactLoadMismatch(
                "refusing to save a model with a preprocessor of a different schema".to_string(),
            ));
        }
        fs::create_dir_all(&self.dir)?;

        let pair_id = Uuid::new_v4();
        let model_entry = self.write_blob(MODEL_FILE, &Blob { pair_id, payload: model })?;
        let preprocessor_entry = self.write_blob(
            PREPROCESSOR_FILE,
            &Blob {
                pair_id,
                payload: preprocessor,
            },
        )?;

        let manifest = ArtifactManifest {
            format_version: FORMAT_VERSION,
            pair_id,
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            model: model_entry,
            preprocessor: preprocessor_entry,
            schema,
            requested_embedding_size: preprocessor.requested_embedding_size(),
            n_trees: model.n_trees(),
            config: config.clone(),
            metrics: metrics.copied(),
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        atomic_write(&self.dir.join(MANIFEST_FILE), &json)?;

        info!(
            dir = %self.dir.display(),
            pair_id = %pair_id,
            n_trees = manifest.n_trees,
            "Saved artifact pair"
        );
        Ok(manifest)
    }

    pub fn read_manifest(&self) -> Result<ArtifactManifest> {
        let bytes = self.read_file(MANIFEST_FILE)?;
        let manifest: ArtifactManifest = serde_json::from_slice(&bytes)
            .map_err(|e| Error::ArtifactLoadMismatch(format!("unreadable manifest: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::ArtifactLoadMismatch(format!(
                "unsupported artifact format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Load and verify both halves of the pair
    pub fn load(&self) -> Result<LoadedArtifacts> {
        let manifest = self.read_manifest()?;

        let model: Blob<TrainedModel> = self.read_blob(&manifest.model)?;
        let preprocessor: Blob<FittedPreprocessor> = self.read_blob(&manifest.preprocessor)?;

        for (name, id) in [(MODEL_FILE, model.pair_id), (PREPROCESSOR_FILE, preprocessor.pair_id)] {
            if id != manifest.pair_id {
                warn!(file = name, expected = %manifest.pair_id, found = %id, "Artifact pair id mismatch");
                return Err(Error::ArtifactLoadMismatch(format!(
                    "{name} belongs to pair {id}, manifest names {}",
                    manifest.pair_id
                )));
            }
        }

        let (model, preprocessor) = (model.payload, preprocessor.payload);
        let schema = preprocessor.schema();
        if schema != manifest.schema {
            return Err(Error::ArtifactLoadMismatch(
                "preprocessor schema differs from the manifest".to_string(),
            ));
        }
        model.check_schema(&schema)?;

        info!(
            dir = %self.dir.display(),
            pair_id = %manifest.pair_id,
            n_trees = model.n_trees(),
            embedding_width = preprocessor.embedding_width(),
            "Loaded artifact pair"
        );
        Ok(LoadedArtifacts {
            model,
            preprocessor,
            manifest,
        })
    }

    /// Load the pair and build a predictor gated with the training thresholds
    pub fn load_inference(&self) -> Result<PricePredictor> {
        let loaded = self.load()?;
        let gate = loaded.gate();
        loaded.into_predictor(gate)
    }

    fn write_blob<T: Serialize>(&self, file: &str, blob: &T) -> Result<BlobEntry> {
        let encoded = bincode::serialize(blob).map_err(|e| Error::Serialization(e.to_string()))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded)?;
        let compressed = encoder.finish()?;

        atomic_write(&self.dir.join(file), &compressed)?;
        debug!(file, bytes = compressed.len(), "Wrote artifact blob");

        Ok(BlobEntry {
            file: file.to_string(),
            sha256: format!("{:x}", Sha256::digest(&compressed)),
            size: compressed.len() as u64,
        })
    }

    fn read_blob<T: for<'de> Deserialize<'de>>(&self, entry: &BlobEntry) -> Result<T> {
        let bytes = self.read_file(&entry.file)?;
        if bytes.len() as u64 != entry.size {
            return Err(Error::ArtifactLoadMismatch(format!(
                "{} is {} bytes, manifest records {}",
                entry.file,
                bytes.len(),
                entry.size
            )));
        }
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        if checksum != entry.sha256 {
            return Err(Error::ArtifactLoadMismatch(format!(
                "checksum mismatch for {}: expected {}, got {}",
                entry.file, entry.sha256, checksum
            )));
        }

        let mut decoded = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|e| Error::ArtifactLoadMismatch(format!("{} is not a valid blob: {e}", entry.file)))?;
        bincode::deserialize(&decoded)
            .map_err(|e| Error::ArtifactLoadMismatch(format!("{} failed to decode: {e}", entry.file)))
    }

    fn read_file(&self, file: &str) -> Result<Vec<u8>> {
        let path = self.dir.join(file);
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                Error::ArtifactLoadMismatch(format!("missing artifact file {}", path.display()))
            }
            _ => Error::Io(e),
        })
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(bytes))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => Error::Io(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricegate_core::{Preprocessor, Record};
    use pricegate_model::{prices_from_records, ModelTrainer};
    use tempfile::TempDir;

    fn train(descriptions: &[&str]) -> (TrainedModel, FittedPreprocessor, ValidationMetrics) {
        let records: Vec<Record> = descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| {
                Record::new("shawl", "wool", "red", "pashmina", "kashmir", *d).with_price(2000.0 + 250.0 * i as f64)
            })
            .collect();
        let config = PipelineConfig::default();
        let fitted = Preprocessor::new(config.clone()).fit(&records).unwrap();
        let prices = prices_from_records(&records).unwrap();
        let (model, metrics) = ModelTrainer::new(config).train(&fitted, &prices).unwrap();
        (model, fitted, metrics)
    }

    fn shawl_pair() -> (TrainedModel, FittedPreprocessor, ValidationMetrics) {
        train(&[
            "Traditional Kashmir pashmina shawl",
            "Soft red pashmina shawl, hand embroidered",
            "Warm wool shawl with paisley border",
            "Fine pashmina with sozni needlework",
            "Red wool shawl from Kashmir",
        ])
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (model, fitted, metrics) = shawl_pair();
        let config = PipelineConfig::default();

        let manifest = store.save(&model, &fitted, &config, Some(&metrics)).unwrap();
        assert_eq!(manifest.format_version, FORMAT_VERSION);
        assert!(dir.path().join(MANIFEST_FILE).exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.model, model);
        assert_eq!(loaded.preprocessor, fitted);
        assert_eq!(loaded.manifest.pair_id, manifest.pair_id);
        let stored = loaded.manifest.metrics.unwrap();
        assert_eq!(stored.n_train, metrics.n_train);
        assert_eq!(stored.best_iteration, metrics.best_iteration);
        assert!((stored.mae - metrics.mae).abs() < 1e-9);

        let query = Record::new("shawl", "wool", "red", "pashmina", "kashmir", "pashmina shawl");
        let before = PricePredictor::new(model, fitted, SimilarityGate::default())
            .unwrap()
            .predict(&query)
            .unwrap();
        let after = store.load_inference().unwrap().predict(&query).unwrap();
        assert_eq!(before.price.to_bits(), after.price.to_bits());
        assert_eq!(before.decision, after.decision);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("nope"));
        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::ArtifactLoadMismatch(ref msg) if msg.contains(MANIFEST_FILE)));
    }

    #[test]
    fn test_tampered_blob_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (model, fitted, metrics) = shawl_pair();
        store
            .save(&model, &fitted, &PipelineConfig::default(), Some(&metrics))
            .unwrap();

        let path = dir.path().join(MODEL_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(store.load(), Err(Error::ArtifactLoadMismatch(_))));
    }

    #[test]
    fn test_blobs_from_different_runs_are_rejected() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let (model, fitted, _) = shawl_pair();
        let config = PipelineConfig::default();
        ArtifactStore::new(first.path())
            .save(&model, &fitted, &config, None)
            .unwrap();
        let second_manifest = ArtifactStore::new(second.path())
            .save(&model, &fitted, &config, None)
            .unwrap();

        // take the second run's preprocessor and re-point the manifest checksum at it
        fs::copy(
            second.path().join(PREPROCESSOR_FILE),
            first.path().join(PREPROCESSOR_FILE),
        )
        .unwrap();
        let store = ArtifactStore::new(first.path());
        let mut manifest = store.read_manifest().unwrap();
        manifest.preprocessor = second_manifest.preprocessor.clone();
        fs::write(
            first.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::ArtifactLoadMismatch(ref msg) if msg.contains("pair")));
    }

    #[test]
    fn test_unknown_format_version() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (model, fitted, _) = shawl_pair();
        store.save(&model, &fitted, &PipelineConfig::default(), None).unwrap();

        let mut manifest = store.read_manifest().unwrap();
        manifest.format_version = FORMAT_VERSION + 1;
        fs::write(dir.path().join(MANIFEST_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::ArtifactLoadMismatch(ref msg) if msg.contains("version")));
    }

    #[test]
    fn test_mismatched_schema_refused_on_save() {
        let dir = TempDir::new().unwrap();
        let (model, _, _) = shawl_pair();
        let (_, other, _) = train(&["rug", "silk rug", "knotted rug"]);
        let err = ArtifactStore::new(dir.path())
            .save(&model, &other, &PipelineConfig::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactLoadMismatch(_)));
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_overwrite_replaces_pair() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (model, fitted, _) = shawl_pair();
        let config = PipelineConfig::default();
        let first = store.save(&model, &fitted, &config, None).unwrap();
        let second = store.save(&model, &fitted, &config, None).unwrap();
        assert_ne!(first.pair_id, second.pair_id);
        assert_eq!(store.load().unwrap().manifest.pair_id, second.pair_id);
    }
}
