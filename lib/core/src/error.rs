use crate::decision::SimilarityDecision;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Unsupported file format: {0:?} (use .csv, .tsv, .jsonl, .ndjson, .xlsx or .xls)")]
    UnsupportedFileFormat(String),

    #[error("Missing required columns: {0:?}")]
    MissingRequiredColumns(Vec<String>),

    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("Degenerate training set: {0}")]
    DegenerateTrainingSet(String),

    #[error(
        "No similar product found in training data (max category matches {}, max text similarity {:.3})",
        .0.max_category_matches,
        .0.max_text_similarity
    )]
    InsufficientSimilarity(SimilarityDecision),

    #[error("Artifact load mismatch: {0}")]
    ArtifactLoadMismatch(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for the expected "not enough data yet" outcome of the gate
    #[inline]
    pub fn is_insufficient_similarity(&self) -> bool {
        matches!(self, Error::InsufficientSimilarity(_))
    }

    /// The gate diagnostics, when this error is a rejection
    pub fn similarity_decision(&self) -> Option<&SimilarityDecision> {
        match self {
            Error::InsufficientSimilarity(decision) => Some(decision),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<calamine::Error> for Error {
    fn from(e: calamine::Error) -> Self {
        Error::Spreadsheet(e.to_string())
    }
}
