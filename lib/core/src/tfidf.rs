// TF-IDF term weighting over word n-grams
use crate::vector::SparseVector;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TfidfVectorizer {
    // term -> column
    vocabulary: HashMap<String, u32>,
    // column -> inverse document frequency
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    max_features: usize,
}

impl TfidfVectorizer {
    /// Tokenize text for indexing.
    /// Lowercases, splits on anything that is not a word character
    /// (alphanumeric or `_`), and drops single-character tokens.
    #[inline]
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|s| s.chars().count() > 1)
            .map(str::to_string)
            .collect()
    }

    /// Space-joined n-grams for every n in the inclusive range
    pub fn ngrams(tokens: &[String], (lo, hi): (usize, usize)) -> Vec<String> {
        let mut grams = Vec::new();
        for n in lo..=hi {
            if n == 0 || n > tokens.len() {
                continue;
            }
            grams.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        grams
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        Self::ngrams(&Self::tokenize(text), self.ngram_range)
    }

    /// Learn the bounded vocabulary and idf weights from a corpus
    pub fn fit<S: AsRef<str>>(docs: &[S], max_features: usize, ngram_range: (usize, usize)) -> Self {
        let mut term_counts: AHashMap<String, u64> = AHashMap::new();
        let mut term_dfs: AHashMap<String, u32> = AHashMap::new();

        for doc in docs {
            let grams = Self::ngrams(&Self::tokenize(doc.as_ref()), ngram_range);
            let mut seen: AHashSet<&str> = AHashSet::with_capacity(grams.len());
            for gram in &grams {
                *term_counts.entry(gram.clone()).or_insert(0) += 1;
                if seen.insert(gram.as_str()) {
                    *term_dfs.entry(gram.clone()).or_insert(0) += 1;
                }
            }
        }

        // Keep the most frequent terms, ties broken alphabetically
        let mut ranked: Vec<(String, u64)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        terms.sort();

        let n_docs = docs.len() as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = term_dfs.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t, i as u32))
            .collect();

        Self {
            vocabulary,
            idf,
            ngram_range,
            max_features,
        }
    }

    /// Weight one document against the fitted vocabulary.
    /// Unknown terms are ignored; the row is L2-normalised.
    pub fn transform(&self, text: &str) -> SparseVector {
        let pairs: Vec<(u32, f64)> = self
            .analyze(text)
            .iter()
            .filter_map(|gram| self.vocabulary.get(gram).map(|&col| (col, 1.0)))
            .collect();

        let mut row = SparseVector::from_pairs(pairs);
        for (col, value) in row.indices.iter().zip(row.values.iter_mut()) {
            *value *= self.idf[*col as usize];
        }
        row.normalize();
        row
    }

    pub fn transform_all<S: AsRef<str>>(&self, docs: &[S]) -> Vec<SparseVector> {
        docs.iter().map(|d| self.transform(d.as_ref())).collect()
    }

    /// Number of columns in the fitted vocabulary
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column(term).map(|c| self.idf[c as usize])
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            TfidfVectorizer::tokenize("Hand-woven, Pashmina shawl! a 2x"),
            vec!["hand", "woven", "pashmina", "shawl", "2x"]
        );
    }

    #[test]
    fn test_unigrams_and_bigrams() {
        let tokens = TfidfVectorizer::tokenize("red wool shawl");
        let grams = TfidfVectorizer::ngrams(&tokens, (1, 2));
        assert_eq!(grams, vec!["red", "wool", "shawl", "red wool", "wool shawl"]);
    }

    #[test]
    fn test_tokenize_keeps_underscore_words() {
        assert_eq!(TfidfVectorizer::tokenize("Hand_made, hand-made!"), vec!["hand_made", "hand", "made"]);
        assert_eq!(TfidfVectorizer::tokenize("a 5 in x_y"), vec!["in", "x_y"]);
    }

    #[test]
    fn test_vocabulary_is_alphabetical() {
        let tfidf = TfidfVectorizer::fit(&["zeta alpha", "alpha beta"], 100, (1, 1));
        assert_eq!(tfidf.len(), 3);
        assert_eq!(tfidf.column("alpha"), Some(0));
        assert_eq!(tfidf.column("beta"), Some(1));
        assert_eq!(tfidf.column("zeta"), Some(2));
    }

    #[test]
    fn test_smoothed_idf() {
        let tfidf = TfidfVectorizer::fit(&["wool shawl", "wool rug"], 100, (1, 1));
        // df(wool) = 2 of 2 docs, df(rug) = 1
        assert!((tfidf.idf("wool").unwrap() - 1.0).abs() < 1e-12);
        assert!((tfidf.idf("rug").unwrap() - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let tfidf = TfidfVectorizer::fit(&["wool wool silk", "wool cotton"], 2, (1, 1));
        assert_eq!(tfidf.len(), 2);
        assert!(tfidf.column("wool").is_some());
        // silk and cotton tie on frequency; alphabetical order keeps cotton
        assert!(tfidf.column("cotton").is_some());
        assert!(tfidf.column("silk").is_none());
    }

    #[test]
    fn test_transform_is_normalised_and_ignores_unknown() {
        let tfidf = TfidfVectorizer::fit(&["wool shawl", "clay pot"], 100, (1, 2));
        let row = tfidf.transform("Wool shawl from Kashmir");
        assert!((row.norm() - 1.0).abs() < 1e-12);
        assert_eq!(row.nnz(), 3); // wool, shawl, "wool shawl"

        let unknown = tfidf.transform("silicone phone case");
        assert!(unknown.is_empty());
    }
}
