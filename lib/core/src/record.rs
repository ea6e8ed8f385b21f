use serde::{Deserialize, Serialize};

/// Categorical fields, in feature-frame column order
pub const CATEGORICAL_FIELDS: [&str; 5] = ["product_type", "material", "color", "style", "region"];

pub const DESCRIPTION_FIELD: &str = "description";

/// Reserved bucket for rare and unseen categorical values
pub const OTHER_CATEGORY: &str = "__other__";

/// Stand-in for a missing categorical value
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// A single listing, as supplied by upstream tagging or read from a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub product_type: String,
    pub material: String,
    pub color: String,
    pub style: String,
    pub region: String,
    pub description: String,
    /// Training target; absent at inference time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Record {
    pub fn new(
        product_type: impl Into<String>,
        material: impl Into<String>,
        color: impl Into<String>,
        style: impl Into<String>,
        region: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            product_type: product_type.into(),
            material: material.into(),
            color: color.into(),
            style: style.into(),
            region: region.into(),
            description: description.into(),
            price: None,
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Raw categorical values in [`CATEGORICAL_FIELDS`] order, with blanks
    /// replaced by [`UNKNOWN_CATEGORY`]
    pub fn categorical_values(&self) -> [&str; 5] {
        [
            normalize_category(&self.product_type),
            normalize_category(&self.material),
            normalize_category(&self.color),
            normalize_category(&self.style),
            normalize_category(&self.region),
        ]
    }

    /// Set a field by column name. Unknown names are ignored.
    pub(crate) fn set_field(&mut self, name: &str, value: String) {
        match name {
            "product_type" => self.product_type = value,
            "material" => self.material = value,
            "color" => self.color = value,
            "style" => self.style = value,
            "region" => self.region = value,
            DESCRIPTION_FIELD => self.description = value,
            _ => {}
        }
    }
}

#[inline]
fn normalize_category(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN_CATEGORY
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_categories_become_unknown() {
        let record = Record::new("shawl", "", "  ", "pashmina", "kashmir", "");
        assert_eq!(
            record.categorical_values(),
            ["shawl", UNKNOWN_CATEGORY, UNKNOWN_CATEGORY, "pashmina", "kashmir"]
        );
    }

    #[test]
    fn test_deserialize_partial_record() {
        let record: Record =
            serde_json::from_str(r#"{"product_type": "basket", "material": "bamboo"}"#).unwrap();
        assert_eq!(record.product_type, "basket");
        assert_eq!(record.description, "");
        assert_eq!(record.price, None);
    }
}
