//! # pricegate Core
//!
//! Core library for the pricegate price estimator.
//!
//! This crate provides the data model and the feature pipeline:
//!
//! - [`PipelineConfig`] - thresholds and hyperparameters
//! - [`DatasetLoader`] - reads and schema-validates training/query tables
//! - [`CategoryVocabulary`] - rare-category bucketing with a reserved "other" code
//! - [`TfidfVectorizer`] + [`TruncatedSvd`] - description embedding
//! - [`Preprocessor`] / [`FittedPreprocessor`] - fit once, transform many
//!
//! ## Example
//!
//! ```rust
//! use pricegate_core::{PipelineConfig, Preprocessor, Record};
//!
//! let records = vec![
//!     Record::new("shawl", "wool", "red", "pashmina", "kashmir", "soft red pashmina shawl")
//!         .with_price(2500.0),
//!     Record::new("shawl", "wool", "red", "pashmina", "kashmir", "warm wool shawl")
//!         .with_price(2800.0),
//! ];
//!
//! let fitted = Preprocessor::new(PipelineConfig::default()).fit(&records).unwrap();
//! let query = Record::new("shawl", "wool", "blue", "pashmina", "kashmir", "wool shawl");
//! let row = fitted.transform_one(&query);
//! assert_eq!(row.latent.len(), fitted.embedding_width());
//! ```

pub mod config;
pub mod dataset;
pub mod decision;
pub mod error;
pub mod preprocessor;
pub mod record;
pub mod svd;
pub mod tfidf;
pub mod vector;
pub mod vocabulary;

pub use config::{BoosterConfig, PipelineConfig, DEFAULT_REQUIRED_COLUMNS, PRICE_COLUMN};
pub use dataset::{DatasetLoader, Table, TableFormat};
pub use decision::SimilarityDecision;
pub use error::{Error, Result};
pub use preprocessor::{
    FeatureFrame, FeatureRow, FeatureSchema, FittedPreprocessor, Preprocessor,
    TextEmbeddingModel, Transformed,
};
pub use record::{Record, CATEGORICAL_FIELDS, OTHER_CATEGORY, UNKNOWN_CATEGORY};
pub use svd::TruncatedSvd;
pub use tfidf::TfidfVectorizer;
pub use vector::{cosine_similarity, SparseVector};
pub use vocabulary::{CategoryVocabulary, OTHER_CODE};
