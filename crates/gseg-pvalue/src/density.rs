// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Local-correlation terms of the standardized scan processes and the
//! overshoot correction `nu`.
//!
//! All functions take real-valued positions so they can be handed to the
//! quadrature directly. Boundary positions may produce `inf` or `NaN`.

use crate::normal::{norm_cdf, norm_pdf};

/// Local rate of the original edge-count process at split size `s`.
pub fn rho1(n: f64, s: f64, n_edges: f64, sum_degrees_squared: f64) -> f64 {
    let d = n - 2.0 * s;
    let f1 = 4.0 * (n - 1.0) * (2.0 * s * (n - s) - n);
    let f2 = (n + 1.0) * d * d - 2.0 * n * (n - 1.0);
    let f3 = 4.0 * (d * d - n);
    let f4 = 4.0 * n * (s - 1.0) * (n - 1.0) * (n - s - 1.0);
    let f5 = n * (n - 1.0) * (d * d - (n - 2.0));
    let f6 = 4.0 * ((n - 2.0) * d * d - 2.0 * s * (n - s) + n);
    let m = n_edges;
    let num = n * (n - 1.0) * (f1 * m + f2 * sum_degrees_squared - f3 * m * m);
    let den = 2.0 * s * (n - s) * (f4 * m + f5 * sum_degrees_squared - f6 * m * m);
    num / den
}

/// Local rate of the weighted edge-count process at size `t`.
pub fn rho1_rw(n: f64, t: f64) -> f64 {
    let k = (n * n - 3.0 * n + 2.0).powi(4);
    let num = -(2.0 * t * t - 2.0 * n * t + n) * k;
    let den = 2.0
        * t
        * (n - 1.0).powi(3)
        * (n - 2.0).powi(4)
        * (t - 1.0)
        * (n * n - 2.0 * n * t - n + t * t + t);
    num / den
}

/// Local rate of the `|Zd|` component of the max-type process.
pub fn rho_max(n: f64, t: f64) -> f64 {
    n / (2.0 * t * (n - t))
}

/// Overshoot correction `nu(x)`; `nu(0) = 1` by continuity.
pub fn nu(x: f64) -> f64 {
    let y = x / 2.0;
    if y == 0.0 {
        return 1.0;
    }
    let phi = norm_cdf(y);
    (1.0 / y) * (phi - 0.5) / (y * phi + norm_pdf(y))
}

#[cfg(test)]
mod tests {
    use super::{nu, rho_max, rho1, rho1_rw};

    #[test]
    fn nu_is_continuous_at_zero_and_decays() {
        assert_eq!(nu(0.0), 1.0);
        assert!((nu(1e-6) - 1.0).abs() < 1e-5);
        let mut previous = nu(0.0);
        for k in 1..40 {
            let value = nu(f64::from(k) * 0.25);
            assert!(value > 0.0 && value < previous);
            previous = value;
        }
        // nu(x) ~ 2 / x^2 for large x
        assert!((nu(200.0) * 200.0 * 200.0 / 2.0 - 1.0).abs() < 0.02);
        assert_eq!(nu(f64::INFINITY), 0.0);
    }

    #[test]
    fn rate_terms_are_symmetric_in_the_split() {
        let n = 30.0;
        for t in 2..28 {
            let t = f64::from(t);
            assert!((rho_max(n, t) - rho_max(n, n - t)).abs() < 1e-12);
            let w = rho1_rw(n, t);
            assert!((w - rho1_rw(n, n - t)).abs() <= 1e-9 * w.abs());
            let o = rho1(n, t, 60.0, 400.0);
            assert!((o - rho1(n, n - t, 60.0, 400.0)).abs() <= 1e-9 * o.abs());
        }
    }

    #[test]
    fn weighted_rate_matches_a_direct_evaluation() {
        let (n, t) = (20.0f64, 6.0f64);
        let expected = -((2.0 * t * t - 2.0 * n * t + n) * (n * n - 3.0 * n + 2.0).powi(4))
            / (2.0 * t * (n - 1.0).powi(3) * (n - 2.0).powi(4) * (t - 1.0)
                * (n * n - 2.0 * n * t - n + t * t + t));
        assert_eq!(rho1_rw(n, t), expected);
        assert!(rho1_rw(n, 1.0).is_infinite());
    }
}
