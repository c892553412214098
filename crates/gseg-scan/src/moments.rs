// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Null (permutation) moments of the edge counts for a group of size `t`.

use gseg_core::{GraphStats, SimilarityGraph};

/// `[t]_a [n - t]_b / [n]_{a+b}` with falling factorials.
///
/// This is the probability that `a` distinct nodes drawn without replacement
/// land in a group of size `t` and `b` further nodes land in its complement.
/// A vanishing numerator short-circuits to `0`, so boundary sizes never
/// produce `0/0`.
pub fn hypergeometric_weight(n: f64, t: f64, a: u32, b: u32) -> f64 {
    let mut numerator = 1.0;
    for i in 0..a {
        numerator *= t - f64::from(i);
    }
    for j in 0..b {
        numerator *= n - t - f64::from(j);
    }
    if numerator == 0.0 {
        return 0.0;
    }
    let mut denominator = 1.0;
    for k in 0..(a + b) {
        denominator *= n - f64::from(k);
    }
    numerator / denominator
}

/// Mean and variance of the number of edges crossing the split.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossMoments {
    pub mean: f64,
    pub variance: f64,
}

/// First and second moments of the within-group counts `R1`, `R2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WithinMoments {
    pub mu1: f64,
    pub mu2: f64,
    pub v11: f64,
    pub v22: f64,
    pub v12: f64,
}

impl WithinMoments {
    /// Mean and variance of `q R1 + p R2`.
    pub fn combination(&self, q: f64, p: f64) -> (f64, f64) {
        let mean = q * self.mu1 + p * self.mu2;
        let variance = q * q * self.v11 + 2.0 * q * p * self.v12 + p * p * self.v22;
        (mean, variance)
    }

    /// Mean and variance of the difference `R1 - R2`.
    pub fn difference(&self) -> (f64, f64) {
        self.combination(1.0, -1.0)
    }
}

/// Coefficients `(q, p)` of the weighted count `q R1 + p R2` at group size `t`.
pub fn weighted_coefficients(n: f64, t: f64) -> (f64, f64) {
    ((n - t - 1.0) / (n - 2.0), (t - 1.0) / (n - 2.0))
}

/// Standardizes `value` against `mean` and a variance floored at zero.
pub fn standardize(value: f64, mean: f64, variance: f64) -> f64 {
    (value - mean) / variance.max(0.0).sqrt()
}

/// Graph-level quantities the null moments depend on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NullMoments {
    n: f64,
    m: f64,
    sum_degrees_squared: f64,
}

impl NullMoments {
    pub fn new(n: usize, n_edges: usize, sum_degrees_squared: f64) -> Self {
        Self {
            n: n as f64,
            m: n_edges as f64,
            sum_degrees_squared,
        }
    }

    pub fn from_graph(graph: &SimilarityGraph) -> Self {
        Self::new(graph.n(), graph.n_edges(), graph.sum_degrees_squared())
    }

    pub fn from_stats(stats: &GraphStats) -> Self {
        Self::new(stats.n, stats.n_edges, stats.sum_degrees_squared)
    }

    pub fn n(&self) -> f64 {
        self.n
    }

    pub fn n_edges(&self) -> f64 {
        self.m
    }

    fn shared_node_pairs(&self) -> f64 {
        0.5 * self.sum_degrees_squared - self.m
    }

    fn disjoint_edge_pairs(&self) -> f64 {
        self.m * (self.m - 1.0) - 2.0 * self.shared_node_pairs()
    }

    pub fn cross(&self, t: f64) -> CrossMoments {
        let p1 = 2.0 * hypergeometric_weight(self.n, t, 1, 1);
        let p2 = 4.0 * hypergeometric_weight(self.n, t, 2, 2);
        CrossMoments {
            mean: p1 * self.m,
            variance: p2 * self.m
                + (p1 / 2.0 - p2) * self.sum_degrees_squared
                + (p2 - p1 * p1) * self.m * self.m,
        }
    }

    /// `E[R1^2]`, `E[R2^2]` and `E[R1 R2]` at group size `t`.
    pub fn within_raw_second(&self, t: f64) -> (f64, f64, f64) {
        let h = self.shared_node_pairs();
        let g = self.disjoint_edge_pairs();
        let w = |a, b| hypergeometric_weight(self.n, t, a, b);
        let r1 = self.m * w(2, 0) + 2.0 * h * w(3, 0) + g * w(4, 0);
        let r2 = self.m * w(0, 2) + 2.0 * h * w(0, 3) + g * w(0, 4);
        let r12 = g * w(2, 2);
        (r1, r2, r12)
    }

    pub fn within(&self, t: f64) -> WithinMoments {
        let mu1 = self.m * hypergeometric_weight(self.n, t, 2, 0);
        let mu2 = self.m * hypergeometric_weight(self.n, t, 0, 2);
        let (r1, r2, r12) = self.within_raw_second(t);
        WithinMoments {
            mu1,
            mu2,
            v11: r1 - mu1 * mu1,
            v22: r2 - mu2 * mu2,
            v12: r12 - mu1 * mu2,
        }
    }

    /// Moment tables indexed by group size `0..=n`.
    pub fn cross_table(&self) -> Vec<CrossMoments> {
        (0..=self.n as usize).map(|t| self.cross(t as f64)).collect()
    }

    pub fn within_table(&self) -> Vec<WithinMoments> {
        (0..=self.n as usize).map(|t| self.within(t as f64)).collect()
    }
}
