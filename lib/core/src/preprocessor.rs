//! Feature preprocessing
//!
//! [`Preprocessor::fit`] learns per-field [`CategoryVocabulary`] buckets and a
//! TF-IDF + truncated SVD text embedding from the training records, and keeps
//! the transformed training frame for similarity lookups.
//! [`FittedPreprocessor::transform`] applies the fitted state to new records
//! without refitting anything.

use crate::config::PipelineConfig;
use crate::record::{Record, CATEGORICAL_FIELDS};
use crate::svd::TruncatedSvd;
use crate::tfidf::TfidfVectorizer;
use crate::vector::SparseVector;
use crate::vocabulary::CategoryVocabulary;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One transformed record: bucketed categorical codes followed by the dense
/// latent description vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub categories: Vec<u32>,
    pub latent: Vec<f64>,
}

/// Column layout shared by the preprocessor and the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub categorical_fields: Vec<String>,
    /// Codes per categorical column, including the reserved bucket
    pub cardinalities: Vec<usize>,
    pub latent_width: usize,
}

impl FeatureSchema {
    #[inline]
    pub fn n_categorical(&self) -> usize {
        self.categorical_fields.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.categorical_fields.len() + self.latent_width
    }

    /// Column names in frame order
    pub fn column_names(&self) -> Vec<String> {
        self.categorical_fields
            .iter()
            .cloned()
            .chain((0..self.latent_width).map(|i| format!("svd_{i}")))
            .collect()
    }
}

/// Rows of transformed features, aligned with the input records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latent(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.rows.iter().map(|r| r.latent.as_slice())
    }
}

/// Output of [`FittedPreprocessor::transform`]
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub frame: FeatureFrame,
    /// Sparse TF-IDF rows, before the SVD projection
    pub terms: Vec<SparseVector>,
}

impl Transformed {
    /// Dense latent rows, after the SVD projection
    pub fn latent(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.frame.latent()
    }
}

/// TF-IDF vectorizer composed with a truncated SVD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEmbeddingModel {
    tfidf: TfidfVectorizer,
    svd: TruncatedSvd,
}

impl TextEmbeddingModel {
    /// Term row and latent vector for one description
    pub fn embed(&self, text: &str) -> (SparseVector, Vec<f64>) {
        let terms = self.tfidf.transform(text);
        let latent = self.svd.transform(&terms);
        (terms, latent)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.svd.n_components()
    }

    pub fn tfidf(&self) -> &TfidfVectorizer {
        &self.tfidf
    }

    pub fn svd(&self) -> &TruncatedSvd {
        &self.svd
    }
}

/// Fits the preprocessing state from training records
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PipelineConfig,
}

impl Preprocessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Learn vocabularies and the text embedding, and build the training frame
    pub fn fit(&self, records: &[Record]) -> Result<FittedPreprocessor> {
        if records.is_empty() {
            return Err(Error::DegenerateTrainingSet("no training records".to_string()));
        }
        let config = &self.config;

        let values: Vec<[&str; 5]> = records.iter().map(Record::categorical_values).collect();
        let vocabularies: Vec<CategoryVocabulary> = CATEGORICAL_FIELDS
            .iter()
            .enumerate()
            .map(|(col, field)| {
                let vocab = CategoryVocabulary::fit(
                    *field,
                    values.iter().map(|row| row[col]),
                    config.min_category_frequency,
                );
                debug!(field, cardinality = vocab.cardinality(), "Fitted category vocabulary");
                vocab
            })
            .collect();

        let descriptions: Vec<&str> = records.iter().map(|r| r.description.as_str()).collect();
        let tfidf = TfidfVectorizer::fit(
            &descriptions,
            config.tfidf_max_features,
            config.tfidf_ngram_range,
        );
        let terms = tfidf.transform_all(&descriptions);

        let n_components = config
            .embedding_size
            .min(tfidf.len())
            .min(records.len().saturating_sub(1).max(1));
        if n_components == 0 {
            return Err(Error::DegenerateTrainingSet(
                "descriptions contain no usable terms, embedding width would be zero".to_string(),
            ));
        }
        if n_components < config.embedding_size {
            warn!(
                requested = config.embedding_size,
                clamped = n_components,
                rows = records.len(),
                terms = tfidf.len(),
                "Clamped embedding size to fit a small corpus"
            );
        }

        let svd = TruncatedSvd::fit(
            &terms,
            tfidf.len(),
            n_components,
            config.svd_oversamples,
            config.svd_power_iterations,
            config.random_seed,
        )?;

        let text = TextEmbeddingModel { tfidf, svd };
        let rows = values
            .iter()
            .zip(terms.iter())
            .map(|(vals, term_row)| FeatureRow {
                categories: encode(&vocabularies, vals),
                latent: text.svd.transform(term_row),
            })
            .collect();

        info!(
            rows = records.len(),
            terms = text.tfidf.len(),
            embedding_width = text.width(),
            "Fitted preprocessor"
        );

        Ok(FittedPreprocessor {
            vocabularies,
            text,
            training_frame: FeatureFrame { rows },
            requested_embedding_size: config.embedding_size,
        })
    }

    /// Apply an already-fitted preprocessor
    pub fn transform(records: &[Record], fitted: &FittedPreprocessor) -> Transformed {
        fitted.transform(records)
    }
}

fn encode(vocabularies: &[CategoryVocabulary], values: &[&str; 5]) -> Vec<u32> {
    vocabularies
        .iter()
        .zip(values.iter())
        .map(|(vocab, value)| vocab.encode(value))
        .collect()
}

/// Immutable preprocessing state produced by one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    vocabularies: Vec<CategoryVocabulary>,
    text: TextEmbeddingModel,
    training_frame: FeatureFrame,
    requested_embedding_size: usize,
}

impl FittedPreprocessor {
    pub fn transform(&self, records: &[Record]) -> Transformed {
        let mut rows = Vec::with_capacity(records.len());
        let mut terms = Vec::with_capacity(records.len());
        for record in records {
            let (row, term_row) = self.transform_with_terms(record);
            rows.push(row);
            terms.push(term_row);
        }
        Transformed {
            frame: FeatureFrame { rows },
            terms,
        }
    }

    /// Transform a single record into its feature row
    pub fn transform_one(&self, record: &Record) -> FeatureRow {
        self.transform_with_terms(record).0
    }

    fn transform_with_terms(&self, record: &Record) -> (FeatureRow, SparseVector) {
        let values = record.categorical_values();
        let (terms, latent) = self.text.embed(&record.description);
        let row = FeatureRow {
            categories: encode(&self.vocabularies, &values),
            latent,
        };
        (row, terms)
    }

    /// Bucketed categorical values of a record, as strings
    pub fn bucket_values<'a>(&'a self, record: &'a Record) -> Vec<&'a str> {
        self.vocabularies
            .iter()
            .zip(record.categorical_values())
            .map(|(vocab, value)| vocab.bucket(value))
            .collect()
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema {
            categorical_fields: self.vocabularies.iter().map(|v| v.field().to_string()).collect(),
            cardinalities: self.vocabularies.iter().map(CategoryVocabulary::cardinality).collect(),
            latent_width: self.text.width(),
        }
    }

    pub fn training_frame(&self) -> &FeatureFrame {
        &self.training_frame
    }

    pub fn vocabularies(&self) -> &[CategoryVocabulary] {
        &self.vocabularies
    }

    pub fn vocabulary(&self, field: &str) -> Option<&CategoryVocabulary> {
        self.vocabularies.iter().find(|v| v.field() == field)
    }

    pub fn text_model(&self) -> &TextEmbeddingModel {
        &self.text
    }

    #[inline]
    pub fn embedding_width(&self) -> usize {
        self.text.width()
    }

    pub fn requested_embedding_size(&self) -> usize {
        self.requested_embedding_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OTHER_CATEGORY;
    use crate::vocabulary::OTHER_CODE;

    fn corpus() -> Vec<Record> {
        vec![
            Record::new("shawl", "wool", "red", "pashmina", "kashmir", "Soft pashmina shawl in red wool")
                .with_price(2500.0),
            Record::new("shawl", "wool", "brown", "pashmina", "kashmir", "Warm brown pashmina wool shawl")
                .with_price(2700.0),
            Record::new("basket", "bamboo", "brown", "woven", "assam", "Handwoven bamboo basket")
                .with_price(400.0),
            Record::new("basket", "bamboo", "natural", "woven", "assam", "Sturdy woven basket")
                .with_price(450.0),
            Record::new("pot", "clay", "red", "rustic", "jaipur", "Terracotta clay pot").with_price(800.0),
        ]
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            embedding_size: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_fit_buckets_rare_values() {
        let fitted = Preprocessor::new(small_config()).fit(&corpus()).unwrap();
        let product = fitted.vocabulary("product_type").unwrap();
        assert!(product.contains("shawl"));
        assert!(product.contains("basket"));
        assert!(!product.contains("pot"));

        // the pot row was bucketed at fit time
        let pot_row = &fitted.training_frame().rows[4];
        assert_eq!(pot_row.categories[0], OTHER_CODE);
        assert_eq!(pot_row.categories[2], product_code(&fitted, "color", "red"));
    }

    fn product_code(fitted: &FittedPreprocessor, field: &str, value: &str) -> u32 {
        fitted.vocabulary(field).unwrap().encode(value)
    }

    #[test]
    fn test_unseen_values_bucketed_at_transform() {
        let fitted = Preprocessor::new(small_config()).fit(&corpus()).unwrap();
        let query = Record::new("phone_case", "silicone", "black", "modern", "china", "");
        let row = fitted.transform_one(&query);
        assert!(row.categories.iter().all(|&c| c == OTHER_CODE));
        assert_eq!(fitted.bucket_values(&query), vec![OTHER_CATEGORY; 5]);
    }

    #[test]
    fn test_training_frame_matches_transform() {
        let records = corpus();
        let fitted = Preprocessor::new(small_config()).fit(&records).unwrap();
        let transformed = Preprocessor::transform(&records, &fitted);
        assert_eq!(&transformed.frame, fitted.training_frame());
        assert_eq!(transformed.terms.len(), records.len());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let fitted = Preprocessor::new(small_config()).fit(&corpus()).unwrap();
        let query = Record::new("shawl", "wool", "red", "pashmina", "kashmir", "red wool shawl");
        let first = fitted.transform(std::slice::from_ref(&query));
        for _ in 0..5 {
            assert_eq!(fitted.transform(std::slice::from_ref(&query)), first);
        }
    }

    #[test]
    fn test_embedding_clamped_on_small_corpus() {
        let records = corpus();
        let fitted = Preprocessor::new(PipelineConfig::default()).fit(&records).unwrap();
        assert_eq!(fitted.requested_embedding_size(), 50);
        assert_eq!(fitted.embedding_width(), records.len() - 1);
        assert_eq!(fitted.schema().n_features(), 5 + records.len() - 1);
    }

    #[test]
    fn test_single_row_still_fits() {
        let records = vec![corpus().remove(0)];
        let fitted = Preprocessor::new(PipelineConfig::default()).fit(&records).unwrap();
        assert_eq!(fitted.embedding_width(), 1);
    }

    #[test]
    fn test_empty_descriptions_are_degenerate() {
        let records = vec![
            Record::new("shawl", "wool", "red", "pashmina", "kashmir", ""),
            Record::new("shawl", "wool", "red", "pashmina", "kashmir", "!"),
        ];
        let err = Preprocessor::new(PipelineConfig::default()).fit(&records).unwrap_err();
        assert!(matches!(err, Error::DegenerateTrainingSet(_)));
    }

    #[test]
    fn test_no_records_is_degenerate() {
        let err = Preprocessor::new(PipelineConfig::default()).fit(&[]).unwrap_err();
        assert!(matches!(err, Error::DegenerateTrainingSet(_)));
    }

    #[test]
    fn test_schema_column_names() {
        let fitted = Preprocessor::new(small_config()).fit(&corpus()).unwrap();
        let names = fitted.schema().column_names();
        assert_eq!(&names[..5], &CATEGORICAL_FIELDS.map(String::from));
        assert_eq!(names[5], "svd_0");
        assert_eq!(names.len(), 8);
    }
}
