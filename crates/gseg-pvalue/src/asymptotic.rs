// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Analytic tail approximations for the scan maxima.
//!
//! `P(max Z > b)` is approximated by an integral of the local rate of the
//! standardized process over the scan window. With skewness correction the
//! integrand is tabulated per group size, tilted by the third moment, and
//! repaired where the tilt is undefined before being integrated cell by
//! cell.

use crate::density::{nu, rho_max, rho1, rho1_rw};
use crate::normal::{chi2_pdf, norm_pdf};
use crate::quadrature::{QuadratureConfig, integrate, integrate_2d};
use crate::skew::{WithinThirdMoments, original_skewness};
use gseg_core::{GraphStats, GsegError, StatKind, WindowBounds};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Which scan the maximum came from.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// One changepoint.
    Single,
    /// A changed interval.
    Interval,
}

impl Regime {
    /// Integrand of the tail approximation at local rate `x`.
    pub fn density(self, b: f64, x: f64) -> f64 {
        let core = x * nu((2.0 * b * b * x).sqrt());
        match self {
            Self::Single => core,
            Self::Interval => (b * b * core).powi(2),
        }
    }

    pub fn coefficient(self, b: f64) -> f64 {
        match self {
            Self::Single => norm_pdf(b) * b,
            Self::Interval => norm_pdf(b) / b,
        }
    }

    /// Multiplicity of interval starts for an interval of length `t`.
    pub fn weight(self, n: f64, t: f64) -> f64 {
        match self {
            Self::Single => 1.0,
            Self::Interval => n - t,
        }
    }

    /// `∫_lo^hi weight(t) dt`
    fn cell_weight(self, n: f64, lo: f64, hi: f64) -> f64 {
        match self {
            Self::Single => hi - lo,
            Self::Interval => (hi - lo) * (n - 0.5 * (lo + hi)),
        }
    }

    fn generalized_integrand(self, n: f64, b: f64, t: f64, w: f64) -> f64 {
        let (cos, sin) = (w.cos(), w.sin());
        let xw = rho_max(n, t) * cos * cos + rho1_rw(n, t) * sin * sin;
        let core = 2.0 * xw * b * nu((2.0 * b * xw).sqrt());
        match self {
            Self::Single => core / (2.0 * PI),
            Self::Interval => (n - t) * core * core / (2.0 * PI),
        }
    }

    /// Minimum count of undefined tilts that triggers the original-statistic patch.
    fn original_patch_threshold(self, n: f64, lower: f64, upper: f64) -> f64 {
        match self {
            Self::Single => (lower - 1.0) + (n - upper),
            Self::Interval => 2.0 * lower - 1.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AsymptoticConfig {
    pub skew_corr: bool,
    pub quadrature: QuadratureConfig,
}

impl Default for AsymptoticConfig {
    fn default() -> Self {
        Self {
            skew_corr: true,
            quadrature: QuadratureConfig::default(),
        }
    }
}

impl AsymptoticConfig {
    pub fn validate(&self) -> Result<(), GsegError> {
        self.quadrature.validate()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsymptoticPValues {
    pub values: BTreeMap<StatKind, f64>,
    /// Fallbacks, clamps and convergence problems, in evaluation order.
    pub notes: Vec<String>,
}

impl AsymptoticPValues {
    pub fn get(&self, kind: StatKind) -> Option<f64> {
        self.values.get(&kind).copied()
    }
}

/// Tail probabilities for the maxima of a single-changepoint scan.
pub fn pval1(
    stats: &GraphStats,
    zmax: &BTreeMap<StatKind, f64>,
    window: WindowBounds,
    config: &AsymptoticConfig,
) -> Result<AsymptoticPValues, GsegError> {
    asymptotic(Regime::Single, stats, zmax, window, config)
}

/// Tail probabilities for the maxima of an interval scan.
pub fn pval2(
    stats: &GraphStats,
    zmax: &BTreeMap<StatKind, f64>,
    window: WindowBounds,
    config: &AsymptoticConfig,
) -> Result<AsymptoticPValues, GsegError> {
    asymptotic(Regime::Interval, stats, zmax, window, config)
}

/// `(theta_b, ratio)` of the exponential tilt for skewness `r`.
///
/// `theta_b` is zero wherever `1 + 2 r b <= 0` or undefined.
pub fn tilt(b: f64, r: f64) -> (f64, f64) {
    let d = 1.0 + 2.0 * r * b;
    let theta = if d > 0.0 { 2.0 * b / (d.sqrt() + 1.0) } else { 0.0 };
    let ratio = ((b - theta).powi(2) / 2.0 + r * theta.powi(3) / 6.0).exp() / (1.0 + r * theta).sqrt();
    (theta, ratio)
}

/// Integral of the step function `a[k]` on `[k, k + 1)` over `[lower, upper]`.
///
/// Cells past the end of `a` contribute nothing.
pub fn tabulated_integral(regime: Regime, n: f64, a: &[f64], lower: f64, upper: f64) -> f64 {
    if upper <= lower {
        return 0.0;
    }
    let first = lower.max(0.0).floor() as usize;
    let last = (upper.ceil() as usize).min(a.len());
    let mut total = 0.0;
    for (k, &value) in a.iter().enumerate().take(last).skip(first) {
        let lo = lower.max(k as f64);
        let hi = upper.min((k + 1) as f64);
        if hi > lo {
            total += value * regime.cell_weight(n, lo, hi);
        }
    }
    total
}

fn nan_to_num(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(f64::MIN, f64::MAX)
    }
}

fn floor_negatives(a: &mut [f64]) {
    for v in a.iter_mut().filter(|v| **v < 0.0) {
        *v = 0.0;
    }
}

fn step(n: f64, fraction: f64) -> usize {
    (fraction * n).ceil() as usize
}

/// Position in `neg` just before its widest gap; the first one on ties.
fn widest_gap_start(neg: &[usize]) -> usize {
    let mut best = (0, 0);
    for (idx, pair) in neg.windows(2).enumerate() {
        let gap = pair[1] - pair[0];
        if gap > best.1 {
            best = (idx, gap);
        }
    }
    best.0
}

/// Anchors `(id2, id3)` of the left extrapolation, if both fit in `len`.
fn left_anchors(id1: usize, n: f64, len: usize) -> Option<(usize, usize)> {
    let id2 = id1 + step(n, 0.03);
    let id3 = id2 + step(n, 0.09);
    (id3 < len && id2 + 1 < len).then_some((id2, id3))
}

/// Replaces `a[..id2]` by the line through `a[id2 + 1]` with the slope of
/// `a` between `id2` and `id3`.
fn extrapolate_left(a: &mut [f64], id2: usize, id3: usize) {
    let inc = (a[id3] - a[id2]) / (id3 - id2) as f64;
    let anchor = a[id2 + 1];
    for (k, v) in a.iter_mut().enumerate().take(id2) {
        *v = anchor - inc * (id2 - 1 - k) as f64;
    }
}

struct TiltedTable {
    a: Vec<f64>,
    ratio: Vec<f64>,
    /// Indices where `1 + 2 r b <= 0`.
    negative: Vec<usize>,
    /// Entries whose tilt is not strictly defined, `NaN` included.
    undefined: usize,
}

fn tilted_table(regime: Regime, b: f64, r: &[f64], x: &[f64]) -> TiltedTable {
    let mut a = Vec::with_capacity(r.len());
    let mut ratios = Vec::with_capacity(r.len());
    let mut negative = Vec::new();
    let mut undefined = 0;
    for (k, (&rk, &xk)) in r.iter().zip(x).enumerate() {
        let d = 1.0 + 2.0 * rk * b;
        if d <= 0.0 {
            negative.push(k);
        }
        if !(d > 0.0) {
            undefined += 1;
        }
        let (_, ratio) = tilt(b, rk);
        ratios.push(ratio);
        a.push(regime.density(b, xk) * ratio);
    }
    TiltedTable {
        a,
        ratio: ratios,
        negative,
        undefined,
    }
}

/// Symmetric single-piece patch for the weighted process (and the weighted
/// half of max-type). Returns `0` when too much of the tilt is undefined.
///
/// `r` and `x` hold sizes `t = 1..n`.
pub fn pval_sub2(
    regime: Regime,
    n: usize,
    b: f64,
    r: &[f64],
    x: &[f64],
    lower: f64,
    upper: f64,
) -> f64 {
    if b.is_nan() || b < 0.0 {
        return 1.0;
    }
    let nf = n as f64;
    let table = tilted_table(regime, b, r, x);
    let mut a: Vec<f64> = table.a.into_iter().map(nan_to_num).collect();
    let nn = table.undefined;
    if nn as f64 > 0.75 * nf {
        return 0.0;
    }
    if nn as f64 >= (lower - 1.0) + (nf - upper) {
        let neg = &table.negative[..table.negative.len().min(nn)];
        let id1 = widest_gap_start(neg);
        if let Some((id2, id3)) = left_anchors(id1, nf, a.len()) {
            extrapolate_left(&mut a, id2, id3);
            let half = n / 2;
            for j in 0..half {
                let target = half + 1 + j;
                if target >= a.len() {
                    break;
                }
                a[target] = a[half - 1 - j];
            }
            for v in &mut a {
                *v = nan_to_num(*v);
            }
            floor_negatives(&mut a);
        } else {
            tracing::debug!(n, id1, "skewness patch anchors fall outside the table");
        }
    }
    regime.coefficient(b) * tabulated_integral(regime, nf, &a, lower, upper)
}

/// Two-sided patch for the `|Zd|` half of max-type. Returns `0` when either
/// half has too many undefined tilts.
///
/// `r` and `x` hold sizes `t = 1..n`.
pub fn pval_sub1(
    regime: Regime,
    n: usize,
    b: f64,
    r: &[f64],
    x: &[f64],
    lower: f64,
    upper: f64,
) -> f64 {
    if b.is_nan() || b < 0.0 {
        return 1.0;
    }
    let nf = n as f64;
    let table = tilted_table(regime, b, r, x);
    let mut a = table.a;
    let mut ratio = table.ratio;
    let len = a.len();
    let half = n.div_ceil(2).min(len);
    let positive = |range: std::ops::Range<usize>| {
        r[range].iter().filter(|&&rk| 1.0 + 2.0 * rk * b > 0.0).count()
    };
    let nn_left = half - positive(0..half);
    let nn_right = half.saturating_sub(positive(half..len));
    if nn_left as f64 > 0.35 * nf || nn_right as f64 > 0.35 * nf {
        return 0.0;
    }

    if nn_left as f64 >= lower {
        let neg: Vec<usize> = table
            .negative
            .iter()
            .copied()
            .take_while(|&k| k < half)
            .collect();
        // gaps between undefined entries, closed by the distance to the middle
        let mut gaps: Vec<f64> = neg.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
        gaps.push(nf / 2.0 - nn_left as f64);
        let id1 = gaps
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (idx, &gap)| {
                if gap > best.1 { (idx, gap) } else { best }
            })
            .0;
        if let Some((id2, id3)) = left_anchors(id1, nf, len) {
            extrapolate_left(&mut a, id2, id3);
        }
    }

    if nn_right as f64 >= nf - upper {
        let id1 = n.div_ceil(2) as isize - 2;
        let id2 = id1 - step(nf, 0.03) as isize;
        let id3 = id2 - step(nf, 0.09) as isize;
        if id3 >= 0 && id2 >= 1 {
            let (id2, id3) = (id2 as usize, id3 as usize);
            let inc = (ratio[id3] - ratio[id2]) / (id3 as f64 - id2 as f64);
            let anchor = ratio[id2 - 1];
            for (k, v) in ratio.iter_mut().enumerate().skip(id2) {
                *v = anchor + inc * (k - id2) as f64;
            }
            floor_negatives(&mut ratio);
            let start = (n / 2).saturating_sub(1);
            for k in start..len {
                a[k] = regime.density(b, x[k]) * ratio[k];
            }
        } else {
            tracing::debug!(n, "right skewness patch anchors fall outside the table");
        }
    }

    floor_negatives(&mut a);
    2.0 * regime.coefficient(b) * tabulated_integral(regime, nf, &a, lower, upper)
}

fn finalize(kind: StatKind, p: f64, notes: &mut Vec<String>) -> f64 {
    if p.is_nan() {
        notes.push(format!("{kind}: p-value approximation is undefined; reported as 1"));
        return 1.0;
    }
    if p < 0.0 {
        notes.push(format!("{kind}: negative p-value approximation {p} clamped to 0"));
        return 0.0;
    }
    p.min(1.0)
}

fn combine_max_type(u1: f64, u2: f64) -> f64 {
    1.0 - (1.0 - u1.min(1.0)) * (1.0 - u2.min(1.0))
}

struct Evaluator<'a> {
    regime: Regime,
    stats: &'a GraphStats,
    n: f64,
    lower: f64,
    upper: f64,
    quadrature: &'a QuadratureConfig,
    notes: Vec<String>,
}

impl Evaluator<'_> {
    /// `coefficient(b) * ∫ density(rate(t)) weight(t) dt` over the window.
    fn plain(&mut self, kind: StatKind, b: f64, rate: impl Fn(f64) -> f64) -> Result<f64, GsegError> {
        let (regime, n) = (self.regime, self.n);
        let q = integrate(
            |t| regime.density(b, rate(t)) * regime.weight(n, t),
            self.lower,
            self.upper,
            self.quadrature,
        )?;
        if !q.converged {
            self.notes.push(format!(
                "{kind}: quadrature stopped after {} subdivisions with abs_error={:.3e}",
                q.subdivisions, q.abs_error
            ));
        }
        Ok(regime.coefficient(b) * q.value)
    }

    fn original(&mut self, b: f64, skew_corr: bool) -> Result<f64, GsegError> {
        if !skew_corr {
            return self.plain(StatKind::Original, b, rho1_for(self.stats));
        }

        let n = self.stats.n;
        let rate = rho1_for(self.stats);
        let x: Vec<f64> = (1..=n).map(|s| rate(s as f64)).collect();
        let r = original_skewness(self.stats);
        let table = tilted_table(self.regime, b, &r, &x);
        // the last entry (s = n) is degenerate and never counts
        let nn = table.undefined.saturating_sub(1);
        let nf = self.n;
        if nn as f64 > 0.75 * nf {
            self.note_fallback(StatKind::Original, nn);
            return self.plain(StatKind::Original, b, rho1_for(self.stats));
        }

        let mut a = table.a;
        let threshold = self
            .regime
            .original_patch_threshold(nf, self.lower, self.upper);
        if nn as f64 >= threshold {
            let neg = &table.negative[..table.negative.len().min(nn)];
            let id1 = widest_gap_start(neg);
            let id2 = id1 + step(nf, 0.03);
            let id3 = id2 + step(nf, 0.09);
            if id3 < a.len() && id2 + 1 < a.len() {
                let inc = (a[id3] - a[id2]) / (id3 - id2) as f64;
                let anchor = a[id2 + 1];
                for (k, v) in a.iter_mut().enumerate().take(id2 + 1) {
                    *v = anchor - inc * (id2 + 1 - k) as f64;
                }
                let (up, down) = (n.div_ceil(2), n / 2);
                for j in 0..down {
                    a[up + j] = a[down - 1 - j];
                }
                floor_negatives(&mut a);
            } else {
                tracing::debug!(n, id1, "original skewness patch anchors fall outside the table");
            }
        }

        let p = self.regime.coefficient(b)
            * tabulated_integral(self.regime, nf, &a, self.lower, self.upper);
        if p.is_nan() {
            self.notes.push(
                "original: skewness-corrected integral is undefined; plain integral used".to_string(),
            );
            return self.plain(StatKind::Original, b, rho1_for(self.stats));
        }
        Ok(p)
    }

    fn note_fallback(&mut self, kind: StatKind, undefined: usize) {
        tracing::debug!(
            statistic = kind.as_str(),
            undefined,
            "skewness tilt undefined on most of the range; plain integral used"
        );
        self.notes.push(format!(
            "{kind}: skewness correction unavailable ({undefined} undefined tilts); plain integral used"
        ));
    }

    fn weighted(&mut self, b: f64, within: Option<&WithinThirdMoments>) -> Result<f64, GsegError> {
        let n = self.n;
        if let Some(within) = within {
            let size = within.len();
            let x: Vec<f64> = (1..=size).map(|t| rho1_rw(n, t as f64)).collect();
            let r = within.weighted();
            let u = pval_sub2(self.regime, self.stats.n, b, &r, &x, self.lower, self.upper);
            if u > 0.0 {
                return Ok(u);
            }
            self.note_fallback(StatKind::Weighted, r.len());
        }
        self.plain(StatKind::Weighted, b, |t| rho1_rw(n, t))
    }

    fn max_type(&mut self, b: f64, within: Option<&WithinThirdMoments>) -> Result<f64, GsegError> {
        let n = self.n;
        if let Some(within) = within {
            let size = within.len();
            let x_max: Vec<f64> = (1..=size).map(|t| rho_max(n, t as f64)).collect();
            let x_rw: Vec<f64> = (1..=size).map(|t| rho1_rw(n, t as f64)).collect();
            let u1 = pval_sub1(
                self.regime,
                self.stats.n,
                b,
                &within.difference(),
                &x_max,
                self.lower,
                self.upper,
            );
            let u2 = pval_sub2(
                self.regime,
                self.stats.n,
                b,
                &within.weighted(),
                &x_rw,
                self.lower,
                self.upper,
            );
            if u1 > 0.0 && u2 > 0.0 {
                return Ok(combine_max_type(u1, u2));
            }
            self.note_fallback(StatKind::MaxType, size);
        }
        let u1 = 2.0 * self.plain(StatKind::MaxType, b, |t| rho_max(n, t))?;
        let u2 = self.plain(StatKind::MaxType, b, |t| rho1_rw(n, t))?;
        Ok(combine_max_type(u1, u2))
    }

    fn generalized(&mut self, b: f64) -> Result<f64, GsegError> {
        let (regime, n) = (self.regime, self.n);
        let q = integrate_2d(
            |t, w| regime.generalized_integrand(n, b, t, w),
            (self.lower, self.upper),
            (0.0, 2.0 * PI),
            self.quadrature,
        )?;
        if !q.converged {
            self.notes.push(format!(
                "generalized: quadrature stopped after {} subdivisions with abs_error={:.3e}",
                q.subdivisions, q.abs_error
            ));
        }
        Ok(chi2_pdf(b, 2.0)? * q.value)
    }
}

fn rho1_for(stats: &GraphStats) -> impl Fn(f64) -> f64 + '_ {
    let (n, m, s) = (
        stats.n as f64,
        stats.n_edges_f64(),
        stats.sum_degrees_squared,
    );
    move |t| rho1(n, t, m, s)
}

fn asymptotic(
    regime: Regime,
    stats: &GraphStats,
    zmax: &BTreeMap<StatKind, f64>,
    window: WindowBounds,
    config: &AsymptoticConfig,
) -> Result<AsymptoticPValues, GsegError> {
    config.validate()?;
    let mut eval = Evaluator {
        regime,
        stats,
        n: stats.n as f64,
        lower: window.n0 as f64,
        upper: window.n1 as f64,
        quadrature: &config.quadrature,
        notes: Vec::new(),
    };
    let needs_within = zmax.contains_key(&StatKind::Weighted) || zmax.contains_key(&StatKind::MaxType);
    let within = (config.skew_corr && needs_within).then(|| WithinThirdMoments::new(stats));

    let mut values = BTreeMap::new();
    for (&kind, &b) in zmax {
        let raw = if b.is_nan() {
            f64::NAN
        } else if b <= 0.0 {
            1.0
        } else {
            match kind {
                StatKind::Original => eval.original(b, config.skew_corr)?,
                StatKind::Weighted => eval.weighted(b, within.as_ref())?,
                StatKind::MaxType => eval.max_type(b, within.as_ref())?,
                StatKind::Generalized => eval.generalized(b)?,
            }
        };
        values.insert(kind, finalize(kind, raw, &mut eval.notes));
    }

    Ok(AsymptoticPValues {
        values,
        notes: eval.notes,
    })
}
