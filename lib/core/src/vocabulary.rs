//! Rare-category bucketing
//!
//! A [`CategoryVocabulary`] is the explicit value -> index map for one
//! categorical field. Index `0` is reserved for [`OTHER_CATEGORY`]; every
//! value outside the retained set encodes to it.

use crate::record::OTHER_CATEGORY;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Code of the reserved out-of-vocabulary bucket
pub const OTHER_CODE: u32 = 0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryVocabulary {
    field: String,
    // code -> value, values[0] is always OTHER_CATEGORY
    values: Vec<String>,
    index: HashMap<String, u32>,
}

impl CategoryVocabulary {
    /// Retain every value seen at least `min_frequency` times
    pub fn fit<'a, I>(field: impl Into<String>, observed: I, min_frequency: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for value in observed {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut retained: Vec<String> = counts
            .into_iter()
            .filter(|(value, count)| *count >= min_frequency && *value != OTHER_CATEGORY)
            .map(|(value, _)| value.to_string())
            .collect();
        retained.sort();

        let mut values = Vec::with_capacity(retained.len() + 1);
        values.push(OTHER_CATEGORY.to_string());
        values.extend(retained);

        Self::from_values(field, values)
    }

    fn from_values(field: impl Into<String>, values: Vec<String>) -> Self {
        let index = values
            .iter()
            .enumerate()
            .map(|(code, value)| (value.clone(), code as u32))
            .collect();
        Self {
            field: field.into(),
            values,
            index,
        }
    }

    /// Code for a value; anything outside the vocabulary is [`OTHER_CODE`]
    #[inline]
    pub fn encode(&self, value: &str) -> u32 {
        self.index.get(value).copied().unwrap_or(OTHER_CODE)
    }

    /// Bucketed value: the value itself if retained, else [`OTHER_CATEGORY`]
    #[inline]
    pub fn bucket<'a>(&'a self, value: &'a str) -> &'a str {
        if self.index.contains_key(value) {
            value
        } else {
            OTHER_CATEGORY
        }
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    #[inline]
    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of codes, including the reserved bucket
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}
