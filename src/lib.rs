//! # pricegate
//!
//! Fair-price estimation for handcrafted-goods listings that refuses to guess
//! on items unlike anything it was trained on.
//!
//! A gradient-boosted model is trained on `log1p(price)` over bucketed
//! categorical attributes and a TF-IDF + truncated SVD embedding of the
//! description. At inference a similarity gate first checks that some training
//! row shares enough categorical values, or a close enough description; only
//! then is a price returned.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! pricegate train --data listings.csv --out artifacts/
//! pricegate predict --artifacts artifacts/ --record '{"product_type":"shawl","material":"wool","color":"red","style":"pashmina","region":"kashmir","description":"hand embroidered shawl"}'
//! pricegate inspect --artifacts artifacts/
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use pricegate::prelude::*;
//!
//! let config = PipelineConfig::default();
//! pricegate::pipeline::train_from_path("listings.csv", "artifacts", &config).unwrap();
//!
//! let predictor = ArtifactStore::new("artifacts").load_inference().unwrap();
//! let query = Record::new("shawl", "wool", "red", "pashmina", "kashmir", "embroidered shawl");
//! match predictor.predict(&query) {
//!     Ok(p) => println!("estimated price {:.2}", p.price),
//!     Err(e) if e.is_insufficient_similarity() => println!("no similar product in training data"),
//!     Err(e) => panic!("{e}"),
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - [`pricegate-core`](pricegate_core) - records, dataset loading, preprocessing, errors
//! - [`pricegate-similarity`](pricegate_similarity) - the similarity gate
//! - [`pricegate-model`](pricegate_model) - gradient boosting and the gated predictor
//! - [`pricegate-storage`](pricegate_storage) - paired artifact persistence

pub mod pipeline;

pub use pricegate_core::*;
pub use pricegate_model::{
    prices_from_records, ModelTrainer, Prediction, PricePredictor, TrainedModel, ValidationMetrics,
};
pub use pricegate_similarity::{NearestMatches, SimilarityGate};
pub use pricegate_storage::{ArtifactManifest, ArtifactStore, LoadedArtifacts};

/// Prelude for convenient imports
pub mod prelude {
    pub use pricegate_core::{
        DatasetLoader, Error, FittedPreprocessor, PipelineConfig, Preprocessor, Record, Result,
        SimilarityDecision,
    };
    pub use pricegate_model::{ModelTrainer, Prediction, PricePredictor, TrainedModel, ValidationMetrics};
    pub use pricegate_similarity::SimilarityGate;
    pub use pricegate_storage::ArtifactStore;
}
