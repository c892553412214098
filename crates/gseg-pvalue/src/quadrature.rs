// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Adaptive Gauss–Kronrod (7/15) quadrature.
//!
//! The interval with the largest error estimate is bisected until the total
//! error meets `max(epsabs, epsrel * |result|)` or the subdivision limit is
//! reached. The 15-point rule never evaluates the endpoints, so integrands
//! with an endpoint singularity are fine.

use gseg_core::GsegError;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub const DEFAULT_SUBDIVISION_LIMIT: usize = 3000;
/// `2^-13`
pub const DEFAULT_TOLERANCE: f64 = 1.220_703_125e-4;

const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_18,
    0.140_653_259_715_525_92,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_83,
];
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadratureConfig {
    pub limit: usize,
    pub epsabs: f64,
    pub epsrel: f64,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SUBDIVISION_LIMIT,
            epsabs: DEFAULT_TOLERANCE,
            epsrel: DEFAULT_TOLERANCE,
        }
    }
}

impl QuadratureConfig {
    pub fn validate(&self) -> Result<(), GsegError> {
        if self.limit == 0 {
            return Err(GsegError::invalid_argument(
                "quadrature.limit must be >= 1; got 0",
            ));
        }
        for (name, value) in [("epsabs", self.epsabs), ("epsrel", self.epsrel)] {
            if !value.is_finite() || value < 0.0 {
                return Err(GsegError::invalid_argument(format!(
                    "quadrature.{name} must be finite and >= 0.0; got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrature {
    pub value: f64,
    pub abs_error: f64,
    pub subdivisions: usize,
    pub converged: bool,
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

fn kronrod15<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Segment {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut res_g = fc * WG[3];
    let mut res_k = fc * WGK[7];
    let mut res_abs = res_k.abs();
    let mut fv1 = [0.0; 7];
    let mut fv2 = [0.0; 7];

    for j in 0..3 {
        let jtw = 2 * j + 1;
        let abscissa = half * XGK[jtw];
        let f1 = f(center - abscissa);
        let f2 = f(center + abscissa);
        fv1[jtw] = f1;
        fv2[jtw] = f2;
        res_g += WG[j] * (f1 + f2);
        res_k += WGK[jtw] * (f1 + f2);
        res_abs += WGK[jtw] * (f1.abs() + f2.abs());
    }
    for j in 0..4 {
        let jtwm1 = 2 * j;
        let abscissa = half * XGK[jtwm1];
        let f1 = f(center - abscissa);
        let f2 = f(center + abscissa);
        fv1[jtwm1] = f1;
        fv2[jtwm1] = f2;
        res_k += WGK[jtwm1] * (f1 + f2);
        res_abs += WGK[jtwm1] * (f1.abs() + f2.abs());
    }

    let mean = 0.5 * res_k;
    let mut res_asc = WGK[7] * (fc - mean).abs();
    for j in 0..7 {
        res_asc += WGK[j] * ((fv1[j] - mean).abs() + (fv2[j] - mean).abs());
    }

    let width = half.abs();
    res_abs *= width;
    res_asc *= width;
    let mut error = ((res_k - res_g) * half).abs();
    if res_asc != 0.0 && error != 0.0 {
        error = res_asc * (200.0 * error / res_asc).powf(1.5).min(1.0);
    }
    if res_abs > f64::MIN_POSITIVE / (50.0 * f64::EPSILON) {
        error = error.max(50.0 * f64::EPSILON * res_abs);
    }

    Segment {
        a,
        b,
        value: res_k * half,
        error,
    }
}

fn adaptive<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, config: &QuadratureConfig) -> Quadrature {
    let first = kronrod15(f, a, b);
    let mut value = first.value;
    let mut error = first.error;
    let mut heap = BinaryHeap::with_capacity(config.limit + 1);
    heap.push(first);

    let mut subdivisions = 1;
    let tolerance = |value: f64| config.epsabs.max(config.epsrel * value.abs());
    while subdivisions < config.limit && error > tolerance(value) {
        let Some(worst) = heap.pop() else {
            break;
        };
        let mid = 0.5 * (worst.a + worst.b);
        if mid <= worst.a || mid >= worst.b {
            // interval cannot be split further in f64
            heap.push(worst);
            break;
        }
        let left = kronrod15(f, worst.a, mid);
        let right = kronrod15(f, mid, worst.b);
        value += left.value + right.value - worst.value;
        error += left.error + right.error - worst.error;
        heap.push(left);
        heap.push(right);
        subdivisions += 1;
    }

    // recompute from the pieces to shed accumulated rounding
    let value: f64 = heap.iter().map(|s| s.value).sum();
    let abs_error: f64 = heap.iter().map(|s| s.error).sum();
    Quadrature {
        value,
        abs_error,
        subdivisions,
        converged: abs_error <= tolerance(value),
    }
}

fn check_bounds(a: f64, b: f64) -> Result<(), GsegError> {
    if !a.is_finite() || !b.is_finite() {
        return Err(GsegError::numerical_issue(format!(
            "quadrature bounds must be finite; got [{a}, {b}]"
        )));
    }
    Ok(())
}

/// `∫_a^b f(x) dx`. Reversed bounds give the negated integral.
pub fn integrate<F: Fn(f64) -> f64>(
    f: F,
    a: f64,
    b: f64,
    config: &QuadratureConfig,
) -> Result<Quadrature, GsegError> {
    check_bounds(a, b)?;
    config.validate()?;
    if a == b {
        return Ok(Quadrature {
            value: 0.0,
            abs_error: 0.0,
            subdivisions: 0,
            converged: true,
        });
    }
    if a > b {
        let flipped = adaptive(&f, b, a, config);
        return Ok(Quadrature {
            value: -flipped.value,
            ..flipped
        });
    }
    Ok(adaptive(&f, a, b, config))
}

/// `∫_c^d ∫_a^b f(x, y) dx dy`, inner integral over `x`.
pub fn integrate_2d<F: Fn(f64, f64) -> f64>(
    f: F,
    (a, b): (f64, f64),
    (c, d): (f64, f64),
    config: &QuadratureConfig,
) -> Result<Quadrature, GsegError> {
    check_bounds(a, b)?;
    let inner = |y: f64| {
        integrate(|x| f(x, y), a, b, config)
            .map(|q| q.value)
            .unwrap_or(f64::NAN)
    };
    integrate(inner, c, d, config)
}
