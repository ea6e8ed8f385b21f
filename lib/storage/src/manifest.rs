use chrono::{DateTime, Utc};
use pricegate_core::{FeatureSchema, PipelineConfig};
use pricegate_model::ValidationMetrics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bumped whenever the blob layout changes
pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MODEL_FILE: &str = "model.bin";
pub const PREPROCESSOR_FILE: &str = "preprocessor.bin";

/// Checksum entry for one stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub file: String,
    pub sha256: String,
    pub size: u64,
}

/// Commit record of an artifact pair, written after both blobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub format_version: u32,
    pub pair_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub model: BlobEntry,
    pub preprocessor: BlobEntry,
    pub schema: FeatureSchema,
    pub requested_embedding_size: usize,
    pub n_trees: usize,
    /// Training configuration; the gate thresholds are taken from here at load
    pub config: PipelineConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ValidationMetrics>,
}
