// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Significance of graph-based scan maxima: analytic tail approximations
//! with optional skewness correction, and permutation tests.

pub mod asymptotic;
pub mod density;
pub mod normal;
pub mod permutation;
pub mod quadrature;
pub mod skew;

pub use asymptotic::{AsymptoticConfig, AsymptoticPValues, Regime, pval1, pval2};
pub use density::{nu, rho_max, rho1, rho1_rw};
pub use permutation::{
    DEFAULT_PERMUTATIONS, PermutationConfig, PermutationOutcome, PermutationPValues, permpval2,
    permval1,
};
pub use quadrature::{Quadrature, QuadratureConfig, integrate, integrate_2d};
pub use skew::{WithinThirdMoments, original_skewness};

pub fn crate_name() -> &'static str {
    "gseg-pvalue"
}
