//! # pricegate Similarity
//!
//! The similarity gate that decides whether a query is close enough to the
//! training corpus for a price estimate to be trusted.
//!
//! ## How it works
//!
//! 1. The query is transformed with the fitted preprocessor
//! 2. Bucketed categorical codes are compared with every training row;
//!    the best count of equal fields is kept
//! 3. The latent description vector is compared with every training row by
//!    cosine similarity; the best score is kept
//! 4. The query qualifies if either score reaches its threshold
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │    Query    │────>│ Preprocessor│────>│ category matches │──┐
//! │  (record)   │     │ (transform) │     └──────────────────┘  │  OR
//! └─────────────┘     └─────────────┘     ┌──────────────────┐  ├──> SimilarityDecision
//!                                    └───>│ text cosine      │──┘
//!                                         └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pricegate_core::{PipelineConfig, Preprocessor, Record};
//! use pricegate_similarity::SimilarityGate;
//!
//! let records = vec![
//!     Record::new("shawl", "wool", "red", "pashmina", "kashmir", "red pashmina shawl"),
//!     Record::new("shawl", "wool", "red", "pashmina", "kashmir", "soft wool shawl"),
//! ];
//! let fitted = Preprocessor::new(PipelineConfig::default()).fit(&records).unwrap();
//!
//! let gate = SimilarityGate::new(3, 0.6);
//! let query = Record::new("phone_case", "silicone", "black", "modern", "china", "phone case");
//! assert!(!gate.check(&query, &fitted).is_similar);
//! ```

pub mod distance;
pub mod gate;

pub use distance::{category_matches, max_category_matches, max_text_similarity};
pub use gate::{NearestMatches, SimilarityGate};
pub use pricegate_core::SimilarityDecision;
