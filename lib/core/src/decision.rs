use serde::{Deserialize, Serialize};

/// Outcome of the similarity gate for a single query.
///
/// Returned to callers on both paths (alongside a price, or inside
/// [`crate::Error::InsufficientSimilarity`]) so the scores stay observable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityDecision {
    pub is_similar: bool,
    /// Best count of equal bucketed categorical fields over all training rows
    pub max_category_matches: usize,
    /// Best cosine similarity of description embeddings over all training rows
    pub max_text_similarity: f64,
    pub min_category_matches: usize,
    pub text_threshold: f64,
}

impl SimilarityDecision {
    /// Eligibility is an OR of the two signals
    pub fn evaluate(
        max_category_matches: usize,
        max_text_similarity: f64,
        min_category_matches: usize,
        text_threshold: f64,
    ) -> Self {
        let is_similar = max_category_matches >= min_category_matches
            || max_text_similarity >= text_threshold;
        Self {
            is_similar,
            max_category_matches,
            max_text_similarity,
            min_category_matches,
            text_threshold,
        }
    }

    #[inline]
    pub fn category_signal(&self) -> bool {
        self.max_category_matches >= self.min_category_matches
    }

    #[inline]
    pub fn text_signal(&self) -> bool {
        self.max_text_similarity >= self.text_threshold
    }
}
