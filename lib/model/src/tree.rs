//! Regression trees for gradient boosting
//!
//! Trees grow leaf-wise: the leaf with the largest split gain is split next,
//! up to `max_leaves`. Categorical columns split natively on sets of codes,
//! numeric columns on thresholds. The per-feature split search runs in
//! parallel; results are reduced in feature order so a fit is deterministic.

use crate::matrix::{Column, FeatureMatrix, FeatureValue};
use pricegate_core::{BoosterConfig, FeatureRow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Gains at or below this are treated as numerical noise
const MIN_GAIN: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitRule {
    /// `x <= threshold` goes left
    Threshold(f64),
    /// Listed codes (sorted) go left; every other code, seen or not, goes right
    Categories(Vec<u32>),
}

impl SplitRule {
    #[inline]
    pub fn goes_left(&self, value: FeatureValue) -> bool {
        match (self, value) {
            (SplitRule::Threshold(t), FeatureValue::Numeric(x)) => x <= *t,
            (SplitRule::Categories(set), FeatureValue::Category(c)) => set.binary_search(&c).is_ok(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        rule: SplitRule,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_categorical: usize,
}

impl RegressionTree {
    pub fn predict(&self, row: &FeatureRow) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    rule,
                    left,
                    right,
                } => {
                    let value = FeatureValue::of(row, self.n_categorical, *feature);
                    idx = if rule.goes_left(value) { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Highest feature index any split reads
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    /// Whether a split on `feature` uses the rule kind that matches the
    /// column layout (sets for categorical columns, thresholds otherwise)
    pub fn rules_match_layout(&self, n_categorical: usize) -> bool {
        self.n_categorical == n_categorical
            && self.nodes.iter().all(|n| match n {
                Node::Split { feature, rule, .. } => match rule {
                    SplitRule::Categories(_) => *feature < n_categorical,
                    SplitRule::Threshold(_) => *feature >= n_categorical,
                },
                Node::Leaf { .. } => true,
            })
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    rule: SplitRule,
    gain: f64,
}

struct LeafState {
    node: usize,
    indices: Vec<usize>,
    best: Option<SplitCandidate>,
}

/// Grows one tree over a fixed training matrix
pub struct TreeBuilder<'a> {
    matrix: &'a FeatureMatrix,
    n_categorical: usize,
    config: &'a BoosterConfig,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(matrix: &'a FeatureMatrix, n_categorical: usize, config: &'a BoosterConfig) -> Self {
        Self {
            matrix,
            n_categorical,
            config,
        }
    }

    /// Fit a tree to the gradients; leaf values already include the learning rate
    pub fn build(&self, grad: &[f64], hess: &[f64]) -> RegressionTree {
        let root: Vec<usize> = (0..self.matrix.n_rows()).collect();
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut leaves = vec![LeafState {
            node: 0,
            best: self.find_best_split(&root, grad, hess),
            indices: root,
        }];

        while leaves.len() < self.config.max_leaves {
            let mut chosen: Option<usize> = None;
            let mut best_gain = f64::NEG_INFINITY;
            for (pos, leaf) in leaves.iter().enumerate() {
                if let Some(candidate) = &leaf.best {
                    if candidate.gain > best_gain {
                        best_gain = candidate.gain;
                        chosen = Some(pos);
                    }
                }
            }
            let Some(pos) = chosen else {
                break;
            };

            let LeafState { node, indices, best } = leaves.remove(pos);
            let Some(split) = best else {
                break;
            };

            let column = self.matrix.column(split.feature);
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .into_iter()
                .partition(|&i| split.rule.goes_left(column.value(i)));

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[node] = Node::Split {
                feature: split.feature,
                rule: split.rule,
                left,
                right,
            };

            let left_best = self.find_best_split(&left_idx, grad, hess);
            let right_best = self.find_best_split(&right_idx, grad, hess);
            leaves.push(LeafState {
                node: left,
                indices: left_idx,
                best: left_best,
            });
            leaves.push(LeafState {
                node: right,
                indices: right_idx,
                best: right_best,
            });
        }

        for leaf in &leaves {
            let (g, h) = sums(&leaf.indices, grad, hess);
            let denom = h + self.config.lambda_l2;
            let value = if denom > 0.0 {
                -g / denom * self.config.learning_rate
            } else {
                0.0
            };
            nodes[leaf.node] = Node::Leaf { value };
        }

        RegressionTree {
            nodes,
            n_categorical: self.n_categorical,
        }
    }

    fn find_best_split(&self, indices: &[usize], grad: &[f64], hess: &[f64]) -> Option<SplitCandidate> {
        if indices.len() < 2 * self.config.min_samples_leaf {
            return None;
        }
        let (g_total, h_total) = sums(indices, grad, hess);
        let totals = Totals {
            g: g_total,
            h: h_total,
            parent: self.score(g_total, h_total),
        };

        let candidates: Vec<Option<SplitCandidate>> = (0..self.matrix.n_features())
            .into_par_iter()
            .map(|feature| match self.matrix.column(feature) {
                Column::Categorical { codes, cardinality } => {
                    self.best_categorical(feature, codes, *cardinality, indices, grad, hess, &totals)
                }
                Column::Numeric(values) => self.best_numeric(feature, values, indices, grad, hess, &totals),
            })
            .collect();

        let threshold = self.config.min_split_gain.max(MIN_GAIN);
        let mut best: Option<SplitCandidate> = None;
        for candidate in candidates.into_iter().flatten() {
            if candidate.gain > threshold && best.as_ref().map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    #[inline]
    fn score(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.lambda_l2;
        if denom > 0.0 {
            g * g / denom
        } else {
            0.0
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn best_numeric(
        &self,
        feature: usize,
        values: &[f64],
        indices: &[usize],
        grad: &[f64],
        hess: &[f64],
        totals: &Totals,
    ) -> Option<SplitCandidate> {
        let mut entries: Vec<(f64, usize)> = indices.iter().map(|&i| (values[i], i)).collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let n = entries.len();
        let min_leaf = self.config.min_samples_leaf;
        let (mut gl, mut hl) = (0.0, 0.0);
        let mut best: Option<(f64, f64)> = None;

        for k in 0..n.saturating_sub(1) {
            let (value, i) = entries[k];
            gl += grad[i];
            hl += hess[i];

            let left_count = k + 1;
            if left_count < min_leaf {
                continue;
            }
            if n - left_count < min_leaf {
                break;
            }
            let next = entries[k + 1].0;
            if next <= value {
                continue;
            }

            let gain = self.score(gl, hl) + self.score(totals.g - gl, totals.h - hl) - totals.parent;
            if best.map_or(true, |(g, _)| gain > g) {
                best = Some((gain, midpoint(value, next)));
            }
        }

        best.map(|(gain, threshold)| SplitCandidate {
            feature,
            rule: SplitRule::Threshold(threshold),
            gain,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn best_categorical(
        &self,
        feature: usize,
        codes: &[u32],
        cardinality: usize,
        indices: &[usize],
        grad: &[f64],
        hess: &[f64],
        totals: &Totals,
    ) -> Option<SplitCandidate> {
        let mut stats = vec![CategoryStats::default(); cardinality];
        for &i in indices {
            if let Some(s) = stats.get_mut(codes[i] as usize) {
                s.g += grad[i];
                s.h += hess[i];
                s.count += 1;
            }
        }

        let present: Vec<u32> = (0..cardinality)
            .filter(|&c| stats[c].count > 0)
            .map(|c| c as u32)
            .collect();
        if present.len() < 2 {
            return None;
        }

        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf;
        let evaluate = |gl: f64, hl: f64, nl: usize| -> Option<f64> {
            if nl < min_leaf || n - nl < min_leaf {
                return None;
            }
            Some(self.score(gl, hl) + self.score(totals.g - gl, totals.h - hl) - totals.parent)
        };

        let mut best: Option<(f64, Vec<u32>)> = None;

        if present.len() <= self.config.max_cat_onehot {
            for &c in &present {
                let s = &stats[c as usize];
                if let Some(gain) = evaluate(s.g, s.h, s.count) {
                    if best.as_ref().map_or(true, |(g, _)| gain > *g) {
                        best = Some((gain, vec![c]));
                    }
                }
            }
        } else {
            let smooth = self.config.cat_smooth;
            let ratio = |c: u32| {
                let s = &stats[c as usize];
                s.g / (s.h + smooth)
            };
            let mut order = present;
            order.sort_by(|&a, &b| ratio(a).total_cmp(&ratio(b)).then(a.cmp(&b)));

            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
            for k in 0..order.len() - 1 {
                let s = &stats[order[k] as usize];
                gl += s.g;
                hl += s.h;
                nl += s.count;
                if let Some(gain) = evaluate(gl, hl, nl) {
                    if best.as_ref().map_or(true, |(g, _)| gain > *g) {
                        let mut left: Vec<u32> = order[..=k].to_vec();
                        left.sort_unstable();
                        best = Some((gain, left));
                    }
                }
            }
        }

        best.map(|(gain, left)| SplitCandidate {
            feature,
            rule: SplitRule::Categories(left),
            gain,
        })
    }
}

struct Totals {
    g: f64,
    h: f64,
    parent: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CategoryStats {
    g: f64,
    h: f64,
    count: usize,
}

fn sums(indices: &[usize], grad: &[f64], hess: &[f64]) -> (f64, f64) {
    indices
        .iter()
        .fold((0.0, 0.0), |(g, h), &i| (g + grad[i], h + hess[i]))
}

/// Threshold strictly below `hi` so that `hi` always routes right
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi {
        lo
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricegate_core::FeatureSchema;

    fn config(min_leaf: usize) -> BoosterConfig {
        BoosterConfig {
            learning_rate: 1.0,
            min_samples_leaf: min_leaf,
            ..Default::default()
        }
    }

    fn schema(cardinality: usize, latent: usize) -> FeatureSchema {
        FeatureSchema {
            categorical_fields: vec!["kind".into()],
            cardinalities: vec![cardinality],
            latent_width: latent,
        }
    }

    #[test]
    fn test_split_rules() {
        assert!(SplitRule::Threshold(0.5).goes_left(FeatureValue::Numeric(0.5)));
        assert!(!SplitRule::Threshold(0.5).goes_left(FeatureValue::Numeric(0.6)));
        let rule = SplitRule::Categories(vec![1, 3]);
        assert!(rule.goes_left(FeatureValue::Category(3)));
        assert!(!rule.goes_left(FeatureValue::Category(2)));
        assert!(!rule.goes_left(FeatureValue::Category(99)));
    }

    #[test]
    fn test_numeric_split_separates_targets() {
        let rows: Vec<FeatureRow> = (0..8)
            .map(|i| FeatureRow {
                categories: vec![0],
                latent: vec![i as f64],
            })
            .collect();
        let refs: Vec<&FeatureRow> = rows.iter().collect();
        let matrix = FeatureMatrix::from_rows(&refs, &schema(1, 1));
        // residual targets: -1 for x < 4, +1 for x >= 4 (grad = pred - y)
        let grad: Vec<f64> = (0..8).map(|i| if i < 4 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 8];
        let cfg = config(2);
        let tree = TreeBuilder::new(&matrix, 1, &cfg).build(&grad, &hess);

        assert_eq!(tree.predict(&rows[0]), -1.0);
        assert_eq!(tree.predict(&rows[7]), 1.0);
        match &tree.nodes()[0] {
            Node::Split { feature, rule, .. } => {
                assert_eq!(*feature, 1);
                assert_eq!(*rule, SplitRule::Threshold(3.5));
            }
            other => panic!("expected a split, got {other:?}"),
        }
    }

    #[test]
    fn test_categorical_split_groups_codes() {
        // codes 1 and 3 share one target, 2 and 4 another: needs a set split
        let codes = [1u32, 3, 2, 4, 1, 3, 2, 4, 1, 3, 2, 4];
        let rows: Vec<FeatureRow> = codes
            .iter()
            .map(|&c| FeatureRow {
                categories: vec![c],
                latent: vec![],
            })
            .collect();
        let refs: Vec<&FeatureRow> = rows.iter().collect();
        let matrix = FeatureMatrix::from_rows(&refs, &schema(5, 0));
        let grad: Vec<f64> = codes.iter().map(|&c| if c % 2 == 1 { 2.0 } else { -2.0 }).collect();
        let hess = vec![1.0; codes.len()];
        let cfg = BoosterConfig {
            max_cat_onehot: 2,
            cat_smooth: 0.0,
            ..config(1)
        };
        let tree = TreeBuilder::new(&matrix, 1, &cfg).build(&grad, &hess);

        match &tree.nodes()[0] {
            Node::Split { rule, .. } => {
                assert_eq!(*rule, SplitRule::Categories(vec![2, 4]));
            }
            other => panic!("expected a split, got {other:?}"),
        }
        assert!((tree.predict(&rows[0]) + 2.0).abs() < 1e-12);
        assert!((tree.predict(&rows[2]) - 2.0).abs() < 1e-12);
        // a code absent from training routes right with the odd codes
        let unseen = FeatureRow {
            categories: vec![0],
            latent: vec![],
        };
        assert!((tree.predict(&unseen) + 2.0).abs() < 1e-12);
        assert!(tree.rules_match_layout(1));
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let rows: Vec<FeatureRow> = (0..4)
            .map(|i| FeatureRow {
                categories: vec![0],
                latent: vec![i as f64],
            })
            .collect();
        let refs: Vec<&FeatureRow> = rows.iter().collect();
        let matrix = FeatureMatrix::from_rows(&refs, &schema(1, 1));
        let grad = vec![1.0, 1.0, -1.0, -1.0];
        let hess = vec![1.0; 4];
        let cfg = config(3);
        let tree = TreeBuilder::new(&matrix, 1, &cfg).build(&grad, &hess);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.max_feature(), None);
    }

    #[test]
    fn test_max_leaves_respected() {
        let rows: Vec<FeatureRow> = (0..32)
            .map(|i| FeatureRow {
                categories: vec![0],
                latent: vec![i as f64],
            })
            .collect();
        let refs: Vec<&FeatureRow> = rows.iter().collect();
        let matrix = FeatureMatrix::from_rows(&refs, &schema(1, 1));
        let grad: Vec<f64> = (0..32).map(|i| ((i * 7) % 5) as f64 - 2.0).collect();
        let hess = vec![1.0; 32];
        let cfg = BoosterConfig {
            max_leaves: 4,
            ..config(1)
        };
        let tree = TreeBuilder::new(&matrix, 1, &cfg).build(&grad, &hess);
        assert!(tree.n_leaves() <= 4);
        assert!(tree.n_leaves() >= 2);
    }

    #[test]
    fn test_midpoint_stays_below_upper_value() {
        assert_eq!(midpoint(1.0, 3.0), 2.0);
        let lo = 1.0f64;
        let hi = f64::from_bits(lo.to_bits() + 1);
        assert!(midpoint(lo, hi) < hi);
    }
}
