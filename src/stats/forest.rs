//! Multi-output quantile random forest.
//!
//! Trees are grown CART-style on bootstrap samples, splitting to minimize the
//! summed within-node squared error across all targets. Leaves keep the
//! training-row indices that reached them, so prediction pools the leaf
//! samples of every tree and reads quantiles off the pooled empirical
//! distribution rather than averaging point predictions.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ForestConfig;
use crate::error::{ImputationError, Result};

/// A node in a regression tree, stored in a flat arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Internal split: rows with `feature <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Leaf holding the bootstrap training rows that reached it.
    Leaf { samples: Vec<u32> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Route a feature row to its leaf and return the training rows stored
    /// there.
    fn leaf_samples(&self, row: &[f64]) -> &[u32] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { samples } => return samples,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// A fitted quantile random forest over one or more targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileForest {
    trees: Vec<Tree>,
    /// Training target values, column-major: `targets[t][row]`.
    targets: Vec<Vec<f64>>,
    n_features: usize,
}

impl QuantileForest {
    /// Train a forest on a row-major feature matrix `x` and row-major target
    /// matrix `y` (one row per observation, one column per target).
    pub fn fit(x: &[Vec<f64>], y: &[Vec<f64>], config: &ForestConfig, seed: u64) -> Result<Self> {
        config.validate()?;

        if x.is_empty() || y.is_empty() {
            return Err(ImputationError::Internal(
                "cannot fit a forest on an empty training set".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(ImputationError::Internal(format!(
                "feature matrix has {} rows but target matrix has {}",
                x.len(),
                y.len()
            )));
        }

        let n_rows = x.len();
        let n_features = x[0].len();
        let n_targets = y[0].len();
        if n_features == 0 || n_targets == 0 {
            return Err(ImputationError::Internal(
                "forest requires at least one feature and one target".to_string(),
            ));
        }

        // Column-major targets make leaf quantile extraction cheap.
        let mut targets = vec![vec![0.0; n_rows]; n_targets];
        for (row, values) in y.iter().enumerate() {
            if values.len() != n_targets {
                return Err(ImputationError::Internal(
                    "ragged target matrix".to_string(),
                ));
            }
            for (t, &value) in values.iter().enumerate() {
                targets[t][row] = value;
            }
        }

        let mtry = config
            .mtry
            .unwrap_or_else(|| (n_features / 3).max(1))
            .min(n_features);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let bootstrap: Vec<u32> = (0..n_rows)
                .map(|_| rng.gen_range(0..n_rows) as u32)
                .collect();

            let mut builder = TreeBuilder {
                x,
                targets: &targets,
                config,
                mtry,
                nodes: Vec::new(),
                rng: &mut rng,
            };
            builder.grow(bootstrap, 0);
            trees.push(Tree {
                nodes: builder.nodes,
            });
        }

        Ok(Self {
            trees,
            targets,
            n_features,
        })
    }

    /// Number of targets the forest was trained on.
    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Predict each row of `x` at every quantile level in `levels`.
    ///
    /// Returns `out[row][level][target]`. For a given row the predictions are
    /// non-decreasing in the level, since they are read off one pooled sorted
    /// sample.
    pub fn predict_levels(&self, x: &[Vec<f64>], levels: &[f64]) -> Result<Vec<Vec<Vec<f64>>>> {
        let n_targets = self.n_targets();
        let mut out = Vec::with_capacity(x.len());

        for row in x {
            if row.len() != self.n_features {
                return Err(ImputationError::Internal(format!(
                    "prediction row has {} features, forest expects {}",
                    row.len(),
                    self.n_features
                )));
            }

            let mut pooled: Vec<u32> = Vec::new();
            for tree in &self.trees {
                pooled.extend_from_slice(tree.leaf_samples(row));
            }

            let mut row_out = vec![vec![0.0; n_targets]; levels.len()];
            for (t, target_values) in self.targets.iter().enumerate() {
                let mut values: Vec<f64> = pooled
                    .iter()
                    .map(|&idx| target_values[idx as usize])
                    .collect();
                values.sort_by(f64::total_cmp);

                for (li, &level) in levels.iter().enumerate() {
                    row_out[li][t] = sorted_quantile(&values, level);
                }
            }
            out.push(row_out);
        }

        Ok(out)
    }
}

/// Linearly interpolated quantile of an already-sorted non-empty slice.
fn sorted_quantile(values: &[f64], level: f64) -> f64 {
    let n = values.len();
    if n == 1 {
        return values[0];
    }
    let pos = level.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    targets: &'a [Vec<f64>],
    config: &'a ForestConfig,
    mtry: usize,
    nodes: Vec<Node>,
    rng: &'a mut ChaCha8Rng,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `samples`, returning its arena index.
    fn grow(&mut self, samples: Vec<u32>, depth: usize) -> usize {
        let at_depth_limit = self
            .config
            .max_depth
            .is_some_and(|max| depth >= max);

        if at_depth_limit || samples.len() < 2 * self.config.min_samples_leaf {
            return self.push_leaf(samples);
        }

        let n_features = self.x[0].len();
        let feature_pool =
            rand::seq::index::sample(self.rng, n_features, self.mtry).into_vec();

        match self.best_split(&samples, &feature_pool) {
            Some((feature, threshold)) => {
                let (left_samples, right_samples): (Vec<u32>, Vec<u32>) = samples
                    .iter()
                    .partition(|&&s| self.x[s as usize][feature] <= threshold);

                // Reserve the split slot before growing children.
                let index = self.nodes.len();
                self.nodes.push(Node::Leaf { samples: Vec::new() });
                let left = self.grow(left_samples, depth + 1);
                let right = self.grow(right_samples, depth + 1);
                self.nodes[index] = Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                };
                index
            }
            None => self.push_leaf(samples),
        }
    }

    fn push_leaf(&mut self, samples: Vec<u32>) -> usize {
        self.nodes.push(Node::Leaf { samples });
        self.nodes.len() - 1
    }

    /// Scan the candidate features for the split minimizing the summed
    /// within-child squared error across all targets.
    fn best_split(&self, samples: &[u32], features: &[usize]) -> Option<(usize, f64)> {
        let n = samples.len();
        let n_targets = self.targets.len();
        let min_leaf = self.config.min_samples_leaf;

        let mut best: Option<(usize, f64, f64)> = None;

        for &feature in features {
            let mut ordered: Vec<u32> = samples.to_vec();
            ordered.sort_by(|&a, &b| {
                self.x[a as usize][feature].total_cmp(&self.x[b as usize][feature])
            });

            let mut total_sum = vec![0.0; n_targets];
            let mut total_sq = vec![0.0; n_targets];
            for &s in &ordered {
                for t in 0..n_targets {
                    let v = self.targets[t][s as usize];
                    total_sum[t] += v;
                    total_sq[t] += v * v;
                }
            }

            let mut left_sum = vec![0.0; n_targets];
            let mut left_sq = vec![0.0; n_targets];

            for i in 1..n {
                let prev = ordered[i - 1] as usize;
                for t in 0..n_targets {
                    let v = self.targets[t][prev];
                    left_sum[t] += v;
                    left_sq[t] += v * v;
                }

                if i < min_leaf || n - i < min_leaf {
                    continue;
                }

                let lo = self.x[prev][feature];
                let hi = self.x[ordered[i] as usize][feature];
                if hi <= lo {
                    continue;
                }

                let nl = i as f64;
                let nr = (n - i) as f64;
                let mut cost = 0.0;
                for t in 0..n_targets {
                    let right_sum = total_sum[t] - left_sum[t];
                    let right_sq = total_sq[t] - left_sq[t];
                    cost += left_sq[t] - left_sum[t] * left_sum[t] / nl;
                    cost += right_sq - right_sum * right_sum / nr;
                }

                let threshold = (lo + hi) / 2.0;
                if best.is_none_or(|(_, _, best_cost)| cost < best_cost) {
                    best = Some((feature, threshold, cost));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}
