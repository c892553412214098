// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gseg_core::GsegError;
use statrs::distribution::{ChiSquared, Continuous};
use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Standard normal CDF.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// Standard normal density.
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Chi-square density with `dof` degrees of freedom.
pub fn chi2_pdf(x: f64, dof: f64) -> Result<f64, GsegError> {
    let dist = ChiSquared::new(dof).map_err(|err| {
        GsegError::numerical_issue(format!("chi-square with dof={dof} is invalid: {err}"))
    })?;
    Ok(dist.pdf(x))
}

#[cfg(test)]
mod tests {
    use super::{chi2_pdf, norm_cdf, norm_pdf};

    #[test]
    fn normal_reference_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-15);
        assert!((norm_cdf(1.959963984540054) - 0.975).abs() < 1e-12);
        assert!((norm_cdf(-3.0) - 0.0013498980316301).abs() < 1e-12);
        assert!((norm_pdf(0.0) - 0.3989422804014327).abs() < 1e-15);
        assert!((norm_pdf(1.0) - 0.24197072451914337).abs() < 1e-15);
    }

    #[test]
    fn chi2_two_dof_is_exponential() {
        for x in [0.5, 1.0, 4.0, 12.0] {
            let pdf = chi2_pdf(x, 2.0).expect("valid dof");
            assert!((pdf - 0.5 * (-x / 2.0).exp()).abs() < 1e-12);
        }
        assert!(chi2_pdf(1.0, -1.0).is_err());
    }
}
