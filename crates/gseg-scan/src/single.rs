// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::moments::{NullMoments, standardize, weighted_coefficients};
use gseg_core::{GsegError, SimilarityGraph, StatKind, StatSelection, WindowBounds};
use std::collections::BTreeMap;

/// Edge counts for every split index `i` (nodes `0..=i` before the split).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitCounts {
    /// `R`: edges between the two groups.
    pub cross: Vec<usize>,
    /// `R1`: edges inside the before group.
    pub within_before: Vec<usize>,
    /// `R2`: edges inside the after group.
    pub within_after: Vec<usize>,
}

/// Incrementally counts edges as each node moves into the before group.
///
/// Runs in `O(n + total degree)`.
pub fn split_counts(graph: &SimilarityGraph) -> SplitCounts {
    let n = graph.n();
    let m = graph.n_edges();
    let mut cross = Vec::with_capacity(n);
    let mut within_before = Vec::with_capacity(n);
    let mut within_after = Vec::with_capacity(n);

    let (mut r, mut r1) = (0usize, 0usize);
    for i in 0..n {
        let links = graph.neighbors(i);
        // links are ascending: earlier neighbours are already in the before group.
        let subtract = links.partition_point(|&k| k < i);
        let add = links.len() - subtract;
        r = r + add - subtract;
        r1 += subtract;
        cross.push(r);
        within_before.push(r1);
        within_after.push(m - r - r1);
    }

    SplitCounts {
        cross,
        within_before,
        within_after,
    }
}

/// Scan outcome for one statistic kind.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SingleScanResult {
    /// Curve index of the maximum; the first `tauhat + 1` nodes precede the change.
    pub tauhat: usize,
    pub zmax: f64,
    pub curve: Vec<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SingleScan {
    pub window: WindowBounds,
    pub counts: SplitCounts,
    /// `Rw` per split index, present when a within-count statistic was requested.
    pub weighted_counts: Option<Vec<f64>>,
    pub results: BTreeMap<StatKind, SingleScanResult>,
}

impl SingleScan {
    pub fn get(&self, kind: StatKind) -> Option<&SingleScanResult> {
        self.results.get(&kind)
    }

    pub fn zmax(&self) -> BTreeMap<StatKind, f64> {
        self.results
            .iter()
            .map(|(&kind, result)| (kind, result.zmax))
            .collect()
    }
}

/// Lowest index of the largest non-NaN value in `curve[n0..=n1]`.
///
/// When every value in the window is NaN the result is `(n0, NaN)`.
pub fn argmax_in_window(curve: &[f64], window: WindowBounds) -> (usize, f64) {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in curve
        .iter()
        .enumerate()
        .take(window.n1 + 1)
        .skip(window.n0)
    {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.unwrap_or((window.n0, f64::NAN))
}

/// Single-changepoint scan over every split of the node order.
pub fn changepoint1(
    graph: &SimilarityGraph,
    selection: StatSelection,
    window: WindowBounds,
) -> Result<SingleScan, GsegError> {
    let n = graph.n();
    let window = WindowBounds::new(window.n0, window.n1, n)?;
    let counts = split_counts(graph);
    let moments = NullMoments::from_graph(graph);
    let nf = n as f64;

    let mut curves: BTreeMap<StatKind, Vec<f64>> = BTreeMap::new();

    if selection.contains(StatKind::Original) {
        let mut z: Vec<f64> = counts
            .cross
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let cross = moments.cross((i + 1) as f64);
                -standardize(r as f64, cross.mean, cross.variance)
            })
            .collect();
        if let Some(last) = z.last_mut() {
            *last = 0.0;
        }
        curves.insert(StatKind::Original, z);
    }

    let mut weighted_counts = None;
    if selection.needs_within_counts() {
        let mut rw = Vec::with_capacity(n);
        let mut zw = Vec::with_capacity(n);
        let mut zd = Vec::with_capacity(n);
        for i in 0..n {
            let t = (i + 1) as f64;
            let r1 = counts.within_before[i] as f64;
            let r2 = counts.within_after[i] as f64;
            let within = moments.within(t);
            let (q, p) = weighted_coefficients(nf, t);
            let weighted = q * r1 + p * r2;
            let (mu_w, var_w) = within.combination(q, p);
            let (mu_d, var_d) = within.difference();
            rw.push(weighted);
            zw.push(standardize(weighted, mu_w, var_w));
            zd.push(standardize(r1 - r2, mu_d, var_d));
        }

        if selection.contains(StatKind::MaxType) {
            let m = zw
                .iter()
                .zip(&zd)
                .map(|(&w, &d)| max_ignoring_nan(d.abs(), w))
                .collect();
            curves.insert(StatKind::MaxType, m);
        }
        if selection.contains(StatKind::Generalized) {
            let s = zw.iter().zip(&zd).map(|(&w, &d)| w * w + d * d).collect();
            curves.insert(StatKind::Generalized, s);
        }
        if selection.contains(StatKind::Weighted) {
            curves.insert(StatKind::Weighted, zw);
        }
        weighted_counts = Some(rw);
    }

    let results = curves
        .into_iter()
        .map(|(kind, curve)| {
            let (tauhat, zmax) = argmax_in_window(&curve, window);
            if zmax.is_nan() {
                tracing::warn!(
                    statistic = kind.as_str(),
                    n0 = window.n0,
                    n1 = window.n1,
                    "scan curve is undefined on the whole window"
                );
            }
            (
                kind,
                SingleScanResult {
                    tauhat,
                    zmax,
                    curve,
                },
            )
        })
        .collect();

    Ok(SingleScan {
        window,
        counts,
        weighted_counts,
        results,
    })
}

/// `max` that prefers a defined value over NaN.
pub(crate) fn max_ignoring_nan(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, _) => b,
        (_, true) => a,
        _ => a.max(b),
    }
}

#[cfg(test)]
mod tests {
    use super::{argmax_in_window, changepoint1, split_counts};
    use gseg_core::{SimilarityGraph, StatKind, StatSelection, WindowBounds};

    fn two_blocks(n: usize, split: usize) -> SimilarityGraph {
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if (i < split) == (j < split) {
                    edges.push((i, j));
                }
            }
        }
        edges.push((0, n - 1));
        SimilarityGraph::from_edges(n, &edges).expect("valid edges")
    }

    #[test]
    fn split_counts_conserve_edges() {
        let graph = two_blocks(12, 6);
        let counts = split_counts(&graph);
        for i in 0..graph.n() {
            assert_eq!(
                counts.cross[i] + counts.within_before[i] + counts.within_after[i],
                graph.n_edges()
            );
        }
        // only the 0-(n-1) edge crosses at the block boundary
        assert_eq!(counts.cross[5], 1);
        assert_eq!(counts.within_before[5], 15);
        assert_eq!(counts.cross[graph.n() - 1], 0);
        assert_eq!(counts.within_before[graph.n() - 1], graph.n_edges());
    }

    #[test]
    fn argmax_prefers_lowest_index_and_skips_nan() {
        let curve = [9.0, 1.0, f64::NAN, 3.0, 3.0, 2.0, 9.0];
        let window = WindowBounds::new(1, 5, curve.len()).expect("valid window");
        assert_eq!(argmax_in_window(&curve, window), (3, 3.0));

        let all_nan = [f64::NAN; 6];
        let window = WindowBounds::new(2, 4, all_nan.len()).expect("valid window");
        let (tau, zmax) = argmax_in_window(&all_nan, window);
        assert_eq!(tau, 2);
        assert!(zmax.is_nan());
    }

    #[test]
    fn planted_block_boundary_is_found_by_every_statistic() {
        let graph = two_blocks(16, 8);
        let window = WindowBounds::new(2, 14, 16).expect("valid window");
        let scan = changepoint1(&graph, StatSelection::All, window).expect("scan succeeds");

        assert_eq!(scan.results.len(), 4);
        for kind in [StatKind::Original, StatKind::Generalized, StatKind::MaxType] {
            let result = scan.get(kind).expect("kind computed");
            assert_eq!(result.tauhat, 7, "{kind}");
            assert!(result.zmax > 0.0, "{kind}");
            assert_eq!(result.curve.len(), 16);
        }
        assert_eq!(
            scan.get(StatKind::Original).map(|r| r.curve[15]),
            Some(0.0)
        );
        assert!(scan.weighted_counts.is_some());
    }

    #[test]
    fn single_selection_computes_only_that_kind() {
        let graph = two_blocks(10, 5);
        let window = WindowBounds::new(1, 8, 10).expect("valid window");
        let scan = changepoint1(&graph, StatSelection::Single(StatKind::Original), window)
            .expect("scan succeeds");
        assert_eq!(scan.results.len(), 1);
        assert!(scan.weighted_counts.is_none());
    }

    #[test]
    fn window_must_fit_the_graph() {
        let graph = two_blocks(10, 5);
        let window = WindowBounds { n0: 2, n1: 10 };
        assert!(changepoint1(&graph, StatSelection::All, window).is_err());
    }
}
