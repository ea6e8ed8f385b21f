use pricegate_core::{FeatureRow, FeatureSchema};

/// Value of one feature for one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Category(u32),
    Numeric(f64),
}

impl FeatureValue {
    /// Read feature `feature` of a row laid out by `n_categorical`
    #[inline]
    pub fn of(row: &FeatureRow, n_categorical: usize, feature: usize) -> Self {
        if feature < n_categorical {
            FeatureValue::Category(row.categories[feature])
        } else {
            FeatureValue::Numeric(row.latent[feature - n_categorical])
        }
    }
}

/// A feature column of the training partition
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Categorical { codes: Vec<u32>, cardinality: usize },
    Numeric(Vec<f64>),
}

impl Column {
    #[inline]
    pub fn value(&self, row: usize) -> FeatureValue {
        match self {
            Column::Categorical { codes, .. } => FeatureValue::Category(codes[row]),
            Column::Numeric(values) => FeatureValue::Numeric(values[row]),
        }
    }
}

/// Column-major view of a set of feature rows
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<Column>,
    n_rows: usize,
}

impl FeatureMatrix {
    pub fn from_rows(rows: &[&FeatureRow], schema: &FeatureSchema) -> Self {
        let mut columns = Vec::with_capacity(schema.n_features());
        for (f, &cardinality) in schema.cardinalities.iter().enumerate() {
            columns.push(Column::Categorical {
                codes: rows.iter().map(|r| r.categories[f]).collect(),
                cardinality,
            });
        }
        for f in 0..schema.latent_width {
            columns.push(Column::Numeric(rows.iter().map(|r| r.latent[f]).collect()));
        }
        Self {
            columns,
            n_rows: rows.len(),
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn column(&self, feature: usize) -> &Column {
        &self.columns[feature]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_is_column_major() {
        let schema = FeatureSchema {
            categorical_fields: vec!["a".into(), "b".into()],
            cardinalities: vec![3, 2],
            latent_width: 1,
        };
        let r0 = FeatureRow { categories: vec![1, 0], latent: vec![0.5] };
        let r1 = FeatureRow { categories: vec![2, 1], latent: vec![-0.5] };
        let matrix = FeatureMatrix::from_rows(&[&r0, &r1], &schema);

        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.n_features(), 3);
        assert_eq!(matrix.column(0).value(1), FeatureValue::Category(2));
        assert_eq!(matrix.column(2).value(1), FeatureValue::Numeric(-0.5));
        assert_eq!(FeatureValue::of(&r1, 2, 1), FeatureValue::Category(1));
        assert_eq!(FeatureValue::of(&r0, 2, 2), FeatureValue::Numeric(0.5));
    }
}
