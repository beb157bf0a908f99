use anyhow::{Result, bail};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use tracing::debug;

use super::AnomalyDetector;
use crate::profiler::quantile_sorted;

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Isolation-based ensemble anomaly detector.
///
/// Each call builds a fresh forest from a fixed seed, so the detector holds
/// no state between calls and the same input always yields the same flags.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    seed: u64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl IsolationForest {
    pub fn new(n_estimators: usize, max_samples: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_samples: max_samples.max(2),
            seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Anomaly score per row in `(0, 1]`; higher is more anomalous.
    pub fn score_samples(&self, matrix: &[Vec<f64>]) -> Vec<f64> {
        let n = matrix.len();
        if n < 2 {
            return vec![0.0; n];
        }

        let psi = self.max_samples.min(n);
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<Node> = (0..self.n_estimators)
            .map(|_| {
                let indices = sample(&mut rng, n, psi).into_vec();
                build_tree(matrix, indices, 0, height_limit, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(psi);
        matrix
            .iter()
            .map(|row| {
                let mean_path =
                    trees.iter().map(|t| path_length(t, row, 0)).sum::<f64>() / trees.len() as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect()
    }
}

impl AnomalyDetector for IsolationForest {
    fn name(&self) -> &str {
        "isolation_forest"
    }

    fn flag_outliers(&self, matrix: &[Vec<f64>], contamination: f64) -> Result<Vec<bool>> {
        if !(contamination > 0.0 && contamination <= 0.5) {
            bail!("contamination must be in (0, 0.5], got {contamination}");
        }
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            bail!("input matrix contains non-finite values");
        }
        if matrix.len() < 2 {
            return Ok(vec![false; matrix.len()]);
        }

        let scores = self.score_samples(matrix);
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let threshold = quantile_sorted(&sorted, 1.0 - contamination);

        let flags: Vec<bool> = scores.iter().map(|s| *s > threshold).collect();
        debug!(
            "Isolation forest flagged {} of {} rows (threshold {:.4})",
            flags.iter().filter(|f| **f).count(),
            flags.len(),
            threshold
        );
        Ok(flags)
    }
}

// ============================================================================
// Trees
// ============================================================================

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn build_tree(
    matrix: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf { size: indices.len() };
    }

    let n_features = matrix[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(matrix[i][f]), hi.max(matrix[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();

    let Some(&(feature, lo, hi)) = splittable.choose(rng) else {
        return Node::Leaf { size: indices.len() };
    };

    // Interpolate rather than sample `lo..hi`: the span overflows for extreme values.
    let t: f64 = rng.gen_range(0.0..1.0);
    let value = (lo * (1.0 - t) + hi * t).clamp(lo, hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| matrix[i][feature] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(build_tree(matrix, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(matrix, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            if row[*feature] < *value {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
