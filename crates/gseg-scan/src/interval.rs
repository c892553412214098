// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::moments::{CrossMoments, NullMoments, WithinMoments, standardize, weighted_coefficients};
use crate::single::max_ignoring_nan;
use gseg_core::{
    ExecutionContext, GsegError, SimilarityGraph, StatKind, StatSelection, WindowBounds,
};
use std::collections::BTreeMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const CANCEL_CHECK_EVERY_ROWS: usize = 16;

/// Dense `n x n` row-major surface indexed by interval `(i, j]`.
///
/// Entries with `j <= i` are zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StatSurface {
    n: usize,
    values: Vec<f64>,
}

impl StatSurface {
    fn from_rows(n: usize, rows: impl IntoIterator<Item = Vec<f64>>) -> Self {
        let mut values = Vec::with_capacity(n * n);
        for row in rows {
            values.extend(row);
        }
        Self { n, values }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Largest non-NaN value over pairs whose length `j - i` lies in the
    /// window, with every tied pair in row-major order.
    ///
    /// An empty window or an all-NaN region yields `(vec![], NaN)`.
    pub fn argmax(&self, window: WindowBounds) -> (Vec<(usize, usize)>, f64) {
        let n = self.n;
        let admissible = move |i: usize| {
            let lo = i + window.n0.max(1);
            let hi = (i + window.n1).min(n.saturating_sub(1));
            lo..=hi
        };

        let mut zmax = f64::NAN;
        for i in 0..n {
            for j in admissible(i) {
                let value = self.get(i, j);
                if !value.is_nan() && (zmax.is_nan() || value > zmax) {
                    zmax = value;
                }
            }
        }
        if zmax.is_nan() {
            return (Vec::new(), zmax);
        }

        let mut ties = Vec::new();
        for i in 0..n {
            for j in admissible(i) {
                if self.get(i, j) == zmax {
                    ties.push((i, j));
                }
            }
        }
        (ties, zmax)
    }
}

/// Scan outcome for one statistic kind; `tauhat` lists every tied maximum.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalScanResult {
    pub tauhat: Vec<(usize, usize)>,
    pub zmax: f64,
    pub surface: StatSurface,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalScan {
    pub window: WindowBounds,
    /// Window applied to the within-count statistics after boundary adjustment.
    pub within_window: WindowBounds,
    /// `R[i, j]`: edges between `(i, j]` and the rest.
    pub cross_counts: StatSurface,
    /// `Rw[i, j]`, present when a within-count statistic was requested.
    pub weighted_counts: Option<StatSurface>,
    pub results: BTreeMap<StatKind, IntervalScanResult>,
}

impl IntervalScan {
    pub fn get(&self, kind: StatKind) -> Option<&IntervalScanResult> {
        self.results.get(&kind)
    }

    pub fn zmax(&self) -> BTreeMap<StatKind, f64> {
        self.results
            .iter()
            .map(|(&kind, result)| (kind, result.zmax))
            .collect()
    }
}

/// Number of dense surfaces `changepoint2` keeps for `selection`.
pub fn retained_surfaces(selection: StatSelection) -> usize {
    let within = usize::from(selection.needs_within_counts());
    1 + within + selection.kinds().len()
}

struct RowPlan<'a> {
    graph: &'a SimilarityGraph,
    n_edges: usize,
    cross: Vec<CrossMoments>,
    within: Option<Vec<WithinMoments>>,
    selection: StatSelection,
}

struct RowOutput {
    cross: Vec<f64>,
    weighted: Option<Vec<f64>>,
    stats: Vec<(StatKind, Vec<f64>)>,
}

impl RowPlan<'_> {
    fn scan_row(&self, i: usize) -> RowOutput {
        let n = self.graph.n();
        let nf = n as f64;
        let mut cross = vec![0.0; n];
        let mut weighted = self.within.as_ref().map(|_| vec![0.0; n]);
        let mut original = vec![0.0; n];
        let mut zw = vec![0.0; n];
        let mut zd = vec![0.0; n];

        let (mut r, mut r1) = (0usize, 0usize);
        for j in (i + 1)..n {
            let links = self.graph.neighbors(j);
            let lo = links.partition_point(|&k| k <= i);
            let hi = links.partition_point(|&k| k < j);
            let inside = hi - lo;
            let add = links.len() - inside;
            r = r + add - inside;
            r1 += inside;
            let r2 = self.n_edges - r - r1;
            let len = j - i;

            cross[j] = r as f64;
            if self.selection.contains(StatKind::Original) {
                let moments = self.cross[len];
                original[j] = -standardize(r as f64, moments.mean, moments.variance);
            }
            if let (Some(within), Some(weighted)) = (self.within.as_ref(), weighted.as_mut()) {
                let moments = within[len];
                let t = len as f64;
                let (q, p) = weighted_coefficients(nf, t);
                let (r1f, r2f) = (r1 as f64, r2 as f64);
                let rw = q * r1f + p * r2f;
                let (mu_w, var_w) = moments.combination(q, p);
                let (mu_d, var_d) = moments.difference();
                weighted[j] = rw;
                zw[j] = standardize(rw, mu_w, var_w);
                zd[j] = standardize(r1f - r2f, mu_d, var_d);
            }
        }

        let mut stats = Vec::new();
        for kind in self.selection.kinds() {
            let values = match kind {
                StatKind::Original => std::mem::take(&mut original),
                StatKind::Weighted => zw.clone(),
                StatKind::MaxType => zw
                    .iter()
                    .zip(&zd)
                    .map(|(&w, &d)| max_ignoring_nan(d.abs(), w))
                    .collect(),
                StatKind::Generalized => zw.iter().zip(&zd).map(|(&w, &d)| w * w + d * d).collect(),
            };
            stats.push((kind, values));
        }

        RowOutput {
            cross,
            weighted,
            stats,
        }
    }
}

#[cfg(feature = "rayon")]
fn can_use_parallel(ctx: &ExecutionContext<'_>) -> bool {
    ctx.parallel_allowed() && ctx.cancel.is_none()
}

fn compute_rows(plan: &RowPlan<'_>, ctx: &ExecutionContext<'_>) -> Result<Vec<RowOutput>, GsegError> {
    let n = plan.graph.n();

    #[cfg(feature = "rayon")]
    if can_use_parallel(ctx) {
        return Ok((0..n).into_par_iter().map(|i| plan.scan_row(i)).collect());
    }

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        ctx.check_cancelled_every(i, CANCEL_CHECK_EVERY_ROWS)?;
        rows.push(plan.scan_row(i));
        if i % CANCEL_CHECK_EVERY_ROWS == 0 {
            ctx.report_progress((i + 1) as f32 / n as f32);
        }
    }
    Ok(rows)
}

/// Interval scan: every candidate changed interval `(i, j]`.
///
/// Rows `i` restart the incremental bookkeeping and are independent; with
/// the `rayon` feature they run in parallel unless the context forbids it.
/// Output is identical either way.
pub fn changepoint2(
    graph: &SimilarityGraph,
    selection: StatSelection,
    window: WindowBounds,
    ctx: &ExecutionContext<'_>,
) -> Result<IntervalScan, GsegError> {
    let n = graph.n();
    let window = WindowBounds::new(window.n0, window.n1, n)?;
    let within_window = window.interval_adjusted(n);
    ctx.constraints
        .check_surface_allocation(n, retained_surfaces(selection))?;

    let moments = NullMoments::from_graph(graph);
    let plan = RowPlan {
        graph,
        n_edges: graph.n_edges(),
        cross: moments.cross_table(),
        within: selection
            .needs_within_counts()
            .then(|| moments.within_table()),
        selection,
    };

    let rows = compute_rows(&plan, ctx)?;

    let mut cross_rows = Vec::with_capacity(n);
    let mut weighted_rows = Vec::with_capacity(n);
    let mut stat_rows: BTreeMap<StatKind, Vec<Vec<f64>>> = BTreeMap::new();
    for row in rows {
        cross_rows.push(row.cross);
        if let Some(weighted) = row.weighted {
            weighted_rows.push(weighted);
        }
        for (kind, values) in row.stats {
            stat_rows.entry(kind).or_default().push(values);
        }
    }

    let cross_counts = StatSurface::from_rows(n, cross_rows);
    let weighted_counts = plan
        .within
        .is_some()
        .then(|| StatSurface::from_rows(n, weighted_rows));

    let mut results = BTreeMap::new();
    for (kind, rows) in stat_rows {
        let surface = StatSurface::from_rows(n, rows);
        let kind_window = if kind.uses_within_counts() {
            within_window
        } else {
            window
        };
        let (tauhat, zmax) = surface.argmax(kind_window);
        if tauhat.is_empty() {
            tracing::warn!(
                statistic = kind.as_str(),
                n0 = kind_window.n0,
                n1 = kind_window.n1,
                "interval surface has no defined value in the window"
            );
        } else if tauhat.len() > 1 {
            tracing::debug!(
                statistic = kind.as_str(),
                ties = tauhat.len(),
                "interval maximum is tied"
            );
        }
        results.insert(
            kind,
            IntervalScanResult {
                tauhat,
                zmax,
                surface,
            },
        );
    }

    Ok(IntervalScan {
        window,
        within_window,
        cross_counts,
        weighted_counts,
        results,
    })
}
