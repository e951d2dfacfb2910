use crate::analysis::history::CpuHistory;
use crate::config::AnomalyConfig;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

pub const CPU_ANOMALY: &str = "cpu_anomaly";

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

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

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        if depth >= max_depth || values.len() <= 1 {
            return Node::Leaf { size: values.len() };
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        if max <= min {
            return Node::Leaf { size: values.len() };
        }

        let threshold = rng.gen_range(min..max);
        let mut split = 0;
        for i in 0..values.len() {
            if values[i] < threshold {
                values.swap(i, split);
                split += 1;
            }
        }
        let (left, right) = values.split_at_mut(split);
        Node::Split {
            threshold,
            left: Box::new(Node::build(left, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if x < *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// One-dimensional isolation forest with a contamination-based decision threshold.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    threshold: f64,
}

impl IsolationForest {
    pub fn fit(data: &[f64], cfg: &AnomalyConfig, rng: &mut StdRng) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }
        let sample_size = cfg.max_samples.min(data.len()).max(2);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..cfg.trees.max(1))
            .map(|_| {
                let mut sample: Vec<f64> = index::sample(&mut *rng, data.len(), sample_size)
                    .iter()
                    .map(|i| data[i])
                    .collect();
                Node::build(&mut sample, 0, max_depth, &mut *rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            threshold: f64::INFINITY,
        };
        let mut train_scores: Vec<f64> = data.iter().map(|v| forest.score(*v)).collect();
        forest.threshold = percentile(&mut train_scores, 1.0 - cfg.contamination);
        Some(forest)
    }

    /// Anomaly score in (0, 1]; higher means easier to isolate.
    pub fn score(&self, x: f64) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / norm)
    }

    pub fn is_outlier(&self, x: f64) -> bool {
        self.score(x) > self.threshold
    }
}

/// Linear-interpolated quantile, `q` in [0, 1].
fn percentile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::INFINITY;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}

pub struct AnomalyDetector {
    cfg: AnomalyConfig,
    rng: StdRng,
}

impl AnomalyDetector {
    pub fn new(cfg: AnomalyConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { cfg, rng }
    }

    /// Refits on the whole history every call, then classifies `current_cpu`.
    pub fn detect(&mut self, history: &CpuHistory, current_cpu: f64) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        if history.len() <= self.cfg.min_points {
            return tags;
        }

        if let Some(forest) = IsolationForest::fit(&history.values(), &self.cfg, &mut self.rng) {
            if forest.is_outlier(current_cpu) {
                tags.insert(CPU_ANOMALY.to_string());
            }
        }
        tags
    }
}
