use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::params::Params;
use super::traits::{check_training_input, Model, ModelError, ModelFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "gini" => Ok(Self::Gini),
            "entropy" => Ok(Self::Entropy),
            other => Err(ModelError::invalid("criterion", format!("unknown criterion {}", other))),
        }
    }

    /// Impurity of a node holding `positive` of `total` rows with label 1.
    fn impurity(self, positive: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let p = positive as f64 / total as f64;
        let q = 1.0 - p;
        match self {
            Self::Gini => 1.0 - p * p - q * q,
            Self::Entropy => {
                let term = |v: f64| if v > 0.0 { -v * v.log2() } else { 0.0 };
                term(p) + term(q)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            min_samples_leaf: 1,
            random_state: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Share of label-1 training rows that reached this leaf.
    Leaf { positive: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART tree stored as a flat node arena, root at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
}

impl DecisionTree {
    fn grow(
        features: ArrayView2<f64>,
        labels: ArrayView1<u8>,
        rows: Vec<usize>,
        config: &ForestConfig,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = features.ncols();
        let max_features = ((n_features as f64).sqrt() as usize).clamp(1, n_features);

        let mut nodes = vec![Node::Leaf { positive: 0.0 }];
        let mut pending = vec![(rows, 0usize)];

        while let Some((rows, slot)) = pending.pop() {
            let positives = rows.iter().filter(|&&r| labels[r] == 1).count();
            let share = positives as f64 / rows.len() as f64;

            let pure = positives == 0 || positives == rows.len();
            let choice = if pure || rows.len() < 2 * config.min_samples_leaf {
                None
            } else {
                let candidates = index::sample(rng, n_features, max_features).into_vec();
                best_split(features, labels, &rows, &candidates, config)
            };

            match choice {
                None => nodes[slot] = Node::Leaf { positive: share },
                Some(SplitChoice { feature, threshold }) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .into_iter()
                        .partition(|&r| features[[r, feature]] <= threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { positive: 0.0 });
                    nodes.push(Node::Leaf { positive: 0.0 });
                    nodes[slot] = Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    };
                    pending.push((left_rows, left));
                    pending.push((right_rows, right));
                }
            }
        }

        Self { nodes }
    }

    fn positive_share(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { positive } => return *positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

/// Lowest weighted child impurity over the candidate features, honouring the
/// leaf-size floor on both sides.
fn best_split(
    features: ArrayView2<f64>,
    labels: ArrayView1<u8>,
    rows: &[usize],
    candidates: &[usize],
    config: &ForestConfig,
) -> Option<SplitChoice> {
    let total = rows.len();
    let total_positive = rows.iter().filter(|&&r| labels[r] == 1).count();
    let min_leaf = config.min_samples_leaf;
    let mut best: Option<(f64, SplitChoice)> = None;

    for &feature in candidates {
        let mut column: Vec<(f64, u8)> = rows
            .iter()
            .map(|&r| (features[[r, feature]], labels[r]))
            .collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_positive = 0;
        for i in 0..total - 1 {
            if column[i].1 == 1 {
                left_positive += 1;
            }
            let left_n = i + 1;
            let right_n = total - left_n;
            if left_n < min_leaf || right_n < min_leaf || column[i].0 == column[i + 1].0 {
                continue;
            }

            let weighted = (left_n as f64 * config.criterion.impurity(left_positive, left_n)
                + right_n as f64
                    * config
                        .criterion
                        .impurity(total_positive - left_positive, right_n))
                / total as f64;

            if best.as_ref().map_or(true, |(score, _)| weighted < *score) {
                let (lo, hi) = (column[i].0, column[i + 1].0);
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some((weighted, SplitChoice { feature, threshold }));
            }
        }
    }

    best.map(|(_, choice)| choice)
}

/// Bagged CART trees with `sqrt(n_features)` features tried per split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl Model for RandomForest {
    fn train(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<(), ModelError> {
        check_training_input(features, labels)?;
        let n_rows = features.nrows();

        self.trees = (0..self.config.n_estimators)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.config.random_state.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect();
                DecisionTree::grow(features, labels, bootstrap, &self.config, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<u8>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        let n_trees = self.trees.len() as f64;
        Ok(features
            .rows()
            .into_iter()
            .map(|row| {
                let share: f64 = self.trees.iter().map(|tree| tree.positive_share(row)).sum();
                u8::from(share / n_trees > 0.5)
            })
            .collect())
    }
}

impl ModelFactory for RandomForest {
    fn create(params: &Params) -> Result<Self, ModelError> {
        params.reject_unknown(&["n_estimators", "criterion", "min_samples_leaf", "random_state"])?;
        let defaults = ForestConfig::default();
        Ok(Self::new(ForestConfig {
            n_estimators: params.count("n_estimators", defaults.n_estimators)?,
            criterion: Criterion::parse(params.text("criterion", "gini")?)?,
            min_samples_leaf: params.count("min_samples_leaf", defaults.min_samples_leaf)?,
            random_state: params.seed("random_state", defaults.random_state)?,
        }))
    }
}
