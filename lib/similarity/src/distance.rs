//! Per-row match functions used by the similarity gate
//!
//! Categorical comparison works on bucketed codes, so two values that both
//! fell into the reserved "other" bucket count as equal.

use pricegate_core::cosine_similarity;

/// Number of categorical columns with equal codes
#[inline]
pub fn category_matches(a: &[u32], b: &[u32]) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| x == y).count()
}

/// Best categorical match count over all rows, with the first row reaching it.
/// An empty set of rows scores 0 with no row.
pub fn max_category_matches<'a, I>(query: &[u32], rows: I) -> (usize, Option<usize>)
where
    I: IntoIterator<Item = &'a [u32]>,
{
    let mut best = 0;
    let mut best_row = None;
    for (idx, row) in rows.into_iter().enumerate() {
        let matches = category_matches(query, row);
        if best_row.is_none() || matches > best {
            best = matches;
            best_row = Some(idx);
        }
    }
    (best, best_row)
}

/// Best cosine similarity over all rows, with the first row reaching it.
/// An empty set of rows scores 0.0 with no row.
pub fn max_text_similarity<'a, I>(query: &[f64], rows: I) -> (f64, Option<usize>)
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut best = 0.0;
    let mut best_row = None;
    for (idx, row) in rows.into_iter().enumerate() {
        let sim = cosine_similarity(query, row);
        if best_row.is_none() || sim > best {
            best = sim;
            best_row = Some(idx);
        }
    }
    (best, best_row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_matches() {
        assert_eq!(category_matches(&[1, 2, 3, 0, 0], &[1, 2, 4, 0, 1]), 3);
        assert_eq!(category_matches(&[1, 2], &[3, 4]), 0);
    }

    #[test]
    fn test_max_category_matches() {
        let rows: Vec<Vec<u32>> = vec![vec![1, 1, 1], vec![1, 2, 3], vec![1, 2, 0]];
        let (best, row) = max_category_matches(&[1, 2, 3], rows.iter().map(Vec::as_slice));
        assert_eq!(best, 3);
        assert_eq!(row, Some(1));
    }

    #[test]
    fn test_max_text_similarity_prefers_first_on_ties() {
        let rows: Vec<Vec<f64>> = vec![vec![0.0, 1.0], vec![2.0, 0.0], vec![1.0, 0.0]];
        let (best, row) = max_text_similarity(&[1.0, 0.0], rows.iter().map(Vec::as_slice));
        assert!((best - 1.0).abs() < 1e-12);
        assert_eq!(row, Some(1));
    }

    #[test]
    fn test_empty_rows() {
        let empty: Vec<Vec<f64>> = Vec::new();
        assert_eq!(max_text_similarity(&[1.0], empty.iter().map(Vec::as_slice)), (0.0, None));
        let empty: Vec<Vec<u32>> = Vec::new();
        assert_eq!(max_category_matches(&[1], empty.iter().map(Vec::as_slice)), (0, None));
    }

    #[test]
    fn test_negative_similarity_is_reported() {
        let rows: Vec<Vec<f64>> = vec![vec![-1.0, 0.0]];
        let (best, row) = max_text_similarity(&[1.0, 0.0], rows.iter().map(Vec::as_slice));
        assert!((best + 1.0).abs() < 1e-12);
        assert_eq!(row, Some(0));
    }
}
