//! Truncated SVD for sparse term matrices
//!
//! Randomized range finder (Gaussian test matrix, power iterations with
//! re-orthonormalisation) followed by an exact Jacobi eigen-decomposition of
//! the small projected Gram matrix. Every random draw comes from a seeded
//! [`StdRng`], so a fit is reproducible for a given seed.

use crate::vector::{dot, SparseVector};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Relative cutoff below which a singular value counts as zero
const SINGULAR_TOLERANCE: f64 = 1e-10;
const JACOBI_MAX_SWEEPS: usize = 100;

/// Row-major dense matrix
type Dense = Vec<Vec<f64>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TruncatedSvd {
    // n_components x n_features
    components: Vec<Vec<f64>>,
    singular_values: Vec<f64>,
    n_features: usize,
}

impl TruncatedSvd {
    /// Fit `n_components` right singular vectors of the sparse matrix `rows`
    pub fn fit(
        rows: &[SparseVector],
        n_features: usize,
        n_components: usize,
        oversamples: usize,
        power_iterations: usize,
        seed: u64,
    ) -> Result<Self> {
        if n_components == 0 || n_features == 0 || rows.is_empty() {
            return Err(Error::DegenerateTrainingSet(format!(
                "cannot fit {n_components} SVD components on {} rows x {n_features} features",
                rows.len()
            )));
        }

        let width = (n_components + oversamples)
            .min(n_features)
            .min(rows.len())
            .max(n_components);
        let mut rng = StdRng::seed_from_u64(seed);

        let omega: Dense = (0..n_features)
            .map(|_| (0..width).map(|_| gaussian(&mut rng)).collect())
            .collect();

        let mut q = sparse_mul(rows, &omega, width);
        orthonormalize_columns(&mut q);
        for _ in 0..power_iterations {
            let mut z = sparse_t_mul(rows, &q, n_features, width);
            orthonormalize_columns(&mut z);
            q = sparse_mul(rows, &z, width);
            orthonormalize_columns(&mut q);
        }

        // B = Q^T X, stored as width x n_features
        let b = transpose(&sparse_t_mul(rows, &q, n_features, width), width);

        let gram: Dense = (0..width)
            .map(|i| (0..width).map(|j| dot(&b[i], &b[j])).collect())
            .collect();
        let (eigenvalues, eigenvectors) = jacobi_eigen(gram);

        let mut order: Vec<usize> = (0..width).collect();
        order.sort_by(|&x, &y| {
            eigenvalues[y]
                .partial_cmp(&eigenvalues[x])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.cmp(&y))
        });

        let top = eigenvalues[order[0]].max(0.0).sqrt();
        let mut components = Vec::with_capacity(n_components);
        let mut singular_values = Vec::with_capacity(n_components);

        for &idx in order.iter().take(n_components) {
            let sigma = eigenvalues[idx].max(0.0).sqrt();
            let mut component = vec![0.0; n_features];
            if sigma > SINGULAR_TOLERANCE * top.max(1.0) {
                for (row_b, row_v) in b.iter().zip(eigenvectors.iter()) {
                    let weight = row_v[idx] / sigma;
                    for (c, x) in component.iter_mut().zip(row_b.iter()) {
                        *c += weight * x;
                    }
                }
                flip_sign(&mut component);
            }
            components.push(component);
            singular_values.push(sigma);
        }

        Ok(Self {
            components,
            singular_values,
            n_features,
        })
    }

    /// Project a sparse row onto the fitted components
    pub fn transform(&self, row: &SparseVector) -> Vec<f64> {
        self.components.iter().map(|c| row.dot_dense(c)).collect()
    }

    pub fn transform_all(&self, rows: &[SparseVector]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    #[inline]
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }
}

/// Standard normal draw (Box-Muller)
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// X * M where X is sparse (n_rows x n_features) and M is n_features x width
fn sparse_mul(rows: &[SparseVector], m: &Dense, width: usize) -> Dense {
    rows.iter()
        .map(|row| {
            let mut out = vec![0.0; width];
            for (i, x) in row.iter() {
                for (o, v) in out.iter_mut().zip(m[i].iter()) {
                    *o += x * v;
                }
            }
            out
        })
        .collect()
}

/// X^T * M where M is n_rows x width; result is n_features x width
fn sparse_t_mul(rows: &[SparseVector], m: &Dense, n_features: usize, width: usize) -> Dense {
    let mut out = vec![vec![0.0; width]; n_features];
    for (row, m_row) in rows.iter().zip(m.iter()) {
        for (i, x) in row.iter() {
            for (o, v) in out[i].iter_mut().zip(m_row.iter()) {
                *o += x * v;
            }
        }
    }
    out
}

fn transpose(m: &Dense, width: usize) -> Dense {
    (0..width)
        .map(|j| m.iter().map(|row| row[j]).collect())
        .collect()
}

/// Modified Gram-Schmidt on the columns of a row-major matrix, applied twice.
/// Columns that collapse to zero stay zero.
fn orthonormalize_columns(m: &mut Dense) {
    let Some(width) = m.first().map(Vec::len) else {
        return;
    };
    for _ in 0..2 {
        for j in 0..width {
            for k in 0..j {
                let proj: f64 = m.iter().map(|row| row[j] * row[k]).sum();
                for row in m.iter_mut() {
                    row[j] -= proj * row[k];
                }
            }
            let norm = m.iter().map(|row| row[j] * row[j]).sum::<f64>().sqrt();
            if norm > 1e-12 {
                for row in m.iter_mut() {
                    row[j] /= norm;
                }
            } else {
                for row in m.iter_mut() {
                    row[j] = 0.0;
                }
            }
        }
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
/// Returns eigenvalues and the eigenvector matrix (eigenvectors as columns).
fn jacobi_eigen(mut a: Dense) -> (Vec<f64>, Dense) {
    let n = a.len();
    let mut v: Dense = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off <= 1e-24 * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

/// Make the largest-magnitude loading positive
fn flip_sign(component: &mut [f64]) {
    let pivot = component
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        for c in component.iter_mut() {
            *c = -*c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse(dense: &[f64]) -> SparseVector {
        SparseVector::from_pairs(
            dense
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0)
                .map(|(i, v)| (i as u32, *v))
                .collect(),
        )
    }

    #[test]
    fn test_jacobi_diagonalises() {
        let (values, vectors) = jacobi_eigen(vec![vec![2.0, 1.0], vec![1.0, 2.0]]);
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((sorted[0] - 1.0).abs() < 1e-9);
        assert!((sorted[1] - 3.0).abs() < 1e-9);
        // eigenvectors are orthonormal
        let col0: Vec<f64> = vectors.iter().map(|r| r[0]).collect();
        let col1: Vec<f64> = vectors.iter().map(|r| r[1]).collect();
        assert!(dot(&col0, &col1).abs() < 1e-9);
        assert!((dot(&col0, &col0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recovers_dominant_direction() {
        // rank one matrix: every row is a multiple of (1, 2, 0, 0)
        let rows: Vec<SparseVector> = (1..=5)
            .map(|k| sparse(&[k as f64, 2.0 * k as f64, 0.0, 0.0]))
            .collect();
        let svd = TruncatedSvd::fit(&rows, 4, 1, 10, 5, 42).unwrap();
        let c = &svd.components()[0];
        let expected = [1.0 / 5f64.sqrt(), 2.0 / 5f64.sqrt(), 0.0, 0.0];
        for (got, want) in c.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-8, "{got} vs {want}");
        }
        // sigma = ||(1..5)|| * sqrt(5)
        let sigma = (55f64).sqrt() * 5f64.sqrt();
        assert!((svd.singular_values()[0] - sigma).abs() < 1e-6);
    }

    #[test]
    fn test_rank_deficient_components_are_zero() {
        let rows: Vec<SparseVector> = (1..=4).map(|k| sparse(&[k as f64, 0.0, 0.0])).collect();
        let svd = TruncatedSvd::fit(&rows, 3, 2, 10, 3, 7).unwrap();
        assert_eq!(svd.n_components(), 2);
        assert!(svd.components()[1].iter().all(|x| *x == 0.0));
        let projected = svd.transform(&rows[0]);
        assert_eq!(projected.len(), 2);
        assert!((projected[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let rows: Vec<SparseVector> = vec![
            sparse(&[0.5, 0.5, 0.0, 0.7]),
            sparse(&[0.0, 0.3, 0.9, 0.0]),
            sparse(&[0.6, 0.0, 0.1, 0.2]),
            sparse(&[0.1, 0.8, 0.0, 0.4]),
        ];
        let a = TruncatedSvd::fit(&rows, 4, 2, 10, 5, 42).unwrap();
        let b = TruncatedSvd::fit(&rows, 4, 2, 10, 5, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_components_rejected() {
        let rows = vec![sparse(&[1.0])];
        assert!(matches!(
            TruncatedSvd::fit(&rows, 1, 0, 10, 5, 42),
            Err(Error::DegenerateTrainingSet(_))
        ));
    }
}
