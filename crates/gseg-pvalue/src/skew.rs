// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Third moments of the edge counts under the permutation null and the
//! resulting skewness of each standardized statistic.
//!
//! Tables are indexed by position: entry `k` belongs to group size `k + 1`.

use gseg_core::GraphStats;
use gseg_scan::moments::{NullMoments, hypergeometric_weight, weighted_coefficients};

/// Skewness of the original statistic for split sizes `s = 1..=n`.
///
/// The sign follows the statistic, which is `-(R - mu) / sigma`.
pub fn original_skewness(stats: &GraphStats) -> Vec<f64> {
    let n = stats.n as f64;
    let m = stats.n_edges_f64();
    let (x1, x2, x3, x4, x5) = (stats.x1, stats.x2, stats.x3, stats.x4, stats.x5);
    let moments = NullMoments::from_stats(stats);

    (1..=stats.n)
        .map(|s| {
            let s = s as f64;
            let w = |a, b| hypergeometric_weight(n, s, a, b);
            let p1 = 2.0 * w(1, 1);
            let p2 = 4.0 * w(2, 2);
            let p3 = w(1, 3) + w(3, 1);
            let p4 = 8.0 * w(3, 3);

            let cross = moments.cross(s);
            let mu = cross.mean;
            let sigma = cross.variance.max(0.0).sqrt();
            let er3 = p1 * m
                + p1 / 2.0 * 3.0 * x1
                + p2 * (3.0 * m * (m - 1.0) - 3.0 * x1)
                + p3 * x2
                + p2 / 2.0 * (3.0 * x4 - 6.0 * x3)
                + p4 * (m * (m - 1.0) * (m - 2.0) - x2 - 3.0 * x4 + 6.0 * x3)
                - 2.0 * p4 * x5;
            (mu.powi(3) + 3.0 * mu * sigma * sigma - er3) / sigma.powi(3)
        })
        .collect()
}

/// Raw third and second moments of `(R1, R2)` for sizes `t = 1..n`.
#[derive(Clone, Debug, PartialEq)]
pub struct WithinThirdMoments {
    n: f64,
    n_edges: f64,
    /// `E[R1^3]`
    pub a1: Vec<f64>,
    /// `E[R1^2 R2]`
    pub b1: Vec<f64>,
    /// `E[R1 R2^2]`
    pub c1: Vec<f64>,
    /// `E[R2^3]`
    pub d1: Vec<f64>,
    pub r1: Vec<f64>,
    pub r2: Vec<f64>,
    pub r12: Vec<f64>,
}

impl WithinThirdMoments {
    pub fn new(stats: &GraphStats) -> Self {
        let n = stats.n as f64;
        let m = stats.n_edges_f64();
        let (x1, x2, x3, x4, x5) = (stats.x1, stats.x2, stats.x3, stats.x4, stats.x5);
        let moments = NullMoments::from_stats(stats);
        let size = stats.n.saturating_sub(1);

        let pairs = m * (m - 1.0) - x1;
        let paths = x4 + 2.0 * x5 - 4.0 * x3;
        let triples = m * (m - 1.0) * (m - 2.0) + 6.0 * x3 - 2.0 * x5 - x2 - 3.0 * x4;
        // E[R^3] for the edges inside one group; `w(k)` is the chance k fixed nodes all land there
        let pure = |w: &dyn Fn(u32) -> f64| {
            m * w(2)
                + 3.0 * x1 * w(3)
                + (3.0 * m * (m - 1.0) - 3.0 * x1) * w(4)
                + x2 * w(4)
                + (6.0 * x3 - 6.0 * x5) * w(4)
                + 2.0 * x5 * w(3)
                + (3.0 * x4 + 6.0 * x5 - 12.0 * x3) * w(5)
                + triples * w(6)
        };

        let mut out = Self {
            n,
            n_edges: m,
            a1: Vec::with_capacity(size),
            b1: Vec::with_capacity(size),
            c1: Vec::with_capacity(size),
            d1: Vec::with_capacity(size),
            r1: Vec::with_capacity(size),
            r2: Vec::with_capacity(size),
            r12: Vec::with_capacity(size),
        };
        for t in 1..stats.n {
            let t = t as f64;
            let w = |a, b| hypergeometric_weight(n, t, a, b);
            out.a1.push(pure(&|k| w(k, 0)));
            out.d1.push(pure(&|k| w(0, k)));
            out.b1
                .push(pairs * w(2, 2) + paths * w(3, 2) + triples * w(4, 2));
            out.c1
                .push(pairs * w(2, 2) + paths * w(2, 3) + triples * w(2, 4));
            let (r1, r2, r12) = moments.within_raw_second(t);
            out.r1.push(r1);
            out.r2.push(r2);
            out.r12.push(r12);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.a1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a1.is_empty()
    }

    /// Skewness of `q R1 + p R2` with `(q, p) = coefficients(t)`.
    ///
    /// With `floor_variance` a negative variance is treated as zero; without
    /// it the entry becomes `NaN`.
    pub fn skewness(
        &self,
        coefficients: impl Fn(f64) -> (f64, f64),
        floor_variance: bool,
    ) -> Vec<f64> {
        let (n, m) = (self.n, self.n_edges);
        (0..self.len())
            .map(|k| {
                let t = (k + 1) as f64;
                let (q, p) = coefficients(t);
                let mu = m * (q * t * (t - 1.0) + p * (n - t) * (n - t - 1.0)) / (n * (n - 1.0));
                let mut variance =
                    q * q * self.r1[k] + 2.0 * q * p * self.r12[k] + p * p * self.r2[k] - mu * mu;
                if floor_variance {
                    variance = variance.max(0.0);
                }
                let sigma = variance.sqrt();
                let er3 = q.powi(3) * self.a1[k]
                    + 3.0 * q * q * p * self.b1[k]
                    + 3.0 * q * p * p * self.c1[k]
                    + p.powi(3) * self.d1[k];
                (er3 - 3.0 * mu * sigma * sigma - mu.powi(3)) / sigma.powi(3)
            })
            .collect()
    }

    /// Skewness of the weighted count for `t = 1..n`.
    pub fn weighted(&self) -> Vec<f64> {
        let n = self.n;
        self.skewness(|t| weighted_coefficients(n, t), false)
    }

    /// Skewness of the difference `R1 - R2` for `t = 1..n`.
    pub fn difference(&self) -> Vec<f64> {
        self.skewness(|_| (1.0, -1.0), true)
    }
}

#[cfg(test)]
mod tests {
    use super::{WithinThirdMoments, original_skewness};
    use gseg_core::SimilarityGraph;

    /// Exact third moments by enumerating every group of size `t`.
    fn brute_force(graph: &SimilarityGraph, t: usize) -> (f64, f64, f64, f64, f64) {
        let n = graph.n();
        let edges = graph.edge_list();
        let (mut count, mut r3, mut r1_3, mut r1r1r2, mut r1r2r2, mut r2_3) =
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        for mask in 0u32..(1 << n) {
            if mask.count_ones() as usize != t {
                continue;
            }
            let inside = |k: usize| mask & (1 << k) != 0;
            let (mut r, mut r1, mut r2) = (0.0, 0.0, 0.0);
            for &(u, v) in &edges {
                match (inside(u), inside(v)) {
                    (true, true) => r1 += 1.0,
                    (false, false) => r2 += 1.0,
                    _ => r += 1.0,
                }
            }
            count += 1.0;
            r3 += f64::powi(r, 3);
            r1_3 += f64::powi(r1, 3);
            r1r1r2 += r1 * r1 * r2;
            r1r2r2 += r1 * r2 * r2;
            r2_3 += f64::powi(r2, 3);
        }
        (
            r3 / count,
            r1_3 / count,
            r1r1r2 / count,
            r1r2r2 / count,
            r2_3 / count,
        )
    }

    fn sample_graph() -> SimilarityGraph {
        let edges = [
            (0, 1),
            (0, 2),
            (1, 2),
            (2, 3),
            (3, 4),
            (4, 5),
            (5, 6),
            (6, 7),
            (1, 5),
            (2, 6),
            (0, 7),
            (3, 7),
        ];
        SimilarityGraph::from_edges(9, &edges).expect("valid edges")
    }

    #[test]
    fn within_third_moments_match_enumeration() {
        let graph = sample_graph();
        let moments = WithinThirdMoments::new(&graph.stats());
        assert_eq!(moments.len(), graph.n() - 1);
        for t in 1..graph.n() {
            let (_, a1, b1, c1, d1) = brute_force(&graph, t);
            let k = t - 1;
            for (got, want) in [
                (moments.a1[k], a1),
                (moments.b1[k], b1),
                (moments.c1[k], c1),
                (moments.d1[k], d1),
            ] {
                assert!((got - want).abs() < 1e-9 * (1.0 + want.abs()), "t={t}: {got} vs {want}");
            }
        }
    }

    #[test]
    fn original_skewness_matches_enumeration() {
        let graph = sample_graph();
        let stats = graph.stats();
        let skew = original_skewness(&stats);
        assert_eq!(skew.len(), graph.n());
        let moments = gseg_scan::NullMoments::from_stats(&stats);
        for s in 2..graph.n() - 1 {
            let (er3, ..) = brute_force(&graph, s);
            let cross = moments.cross(s as f64);
            let sigma = cross.variance.sqrt();
            let mu = cross.mean;
            let expected = (mu.powi(3) + 3.0 * mu * sigma * sigma - er3) / sigma.powi(3);
            let got = skew[s - 1];
            assert!((got - expected).abs() < 1e-9 * (1.0 + expected.abs()), "s={s}");
        }
        assert!(skew[graph.n() - 1].is_nan());
    }

    #[test]
    fn difference_skewness_is_antisymmetric() {
        let graph = sample_graph();
        let moments = WithinThirdMoments::new(&graph.stats());
        let d = moments.difference();
        let n = graph.n();
        // swapping the groups negates R1 - R2
        for t in 2..n - 1 {
            let (a, b) = (d[t - 1], d[n - t - 1]);
            assert!((a + b).abs() < 1e-8 * (1.0 + a.abs()), "t={t}: {a} vs {b}");
        }
    }

    #[test]
    fn five_node_graphs_avoid_zero_over_zero() {
        // a 5-cycle: the sixth-order weights vanish instead of dividing by [5]_6 = 0
        let graph = SimilarityGraph::from_edges(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (0, 4)])
            .expect("valid edges");
        let stats = graph.stats();
        let moments = WithinThirdMoments::new(&stats);
        assert!(moments.a1.iter().chain(&moments.d1).all(|v| v.is_finite()));
        assert!(moments.b1.iter().chain(&moments.c1).all(|v| v.is_finite()));
        let skew = original_skewness(&stats);
        assert!(skew[1].is_finite() && skew[2].is_finite());
    }
}
