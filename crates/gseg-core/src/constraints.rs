// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GsegError;

/// Default cap on the bytes retained by interval-engine surfaces (1 GiB).
pub const DEFAULT_MAX_SURFACE_BYTES: usize = 1 << 30;

/// Resource limits applied to a single analysis call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraints {
    /// Wall-clock budget for the whole call, in milliseconds.
    pub time_budget_ms: Option<u64>,
    /// Upper bound on the memory held by the `N x N` interval surfaces.
    pub max_surface_bytes: Option<usize>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            time_budget_ms: None,
            max_surface_bytes: Some(DEFAULT_MAX_SURFACE_BYTES),
        }
    }
}

impl Constraints {
    pub fn validate(&self) -> Result<(), GsegError> {
        if matches!(self.time_budget_ms, Some(0)) {
            return Err(GsegError::invalid_argument(
                "constraints.time_budget_ms must be >= 1 when provided; got 0",
            ));
        }
        if matches!(self.max_surface_bytes, Some(0)) {
            return Err(GsegError::invalid_argument(
                "constraints.max_surface_bytes must be >= 1 when provided; got 0",
            ));
        }
        Ok(())
    }

    /// Fails when `surfaces` dense `n x n` f64 matrices would exceed the cap.
    pub fn check_surface_allocation(&self, n: usize, surfaces: usize) -> Result<(), GsegError> {
        let Some(limit) = self.max_surface_bytes else {
            return Ok(());
        };

        let required = n
            .checked_mul(n)
            .and_then(|cells| cells.checked_mul(surfaces))
            .and_then(|cells| cells.checked_mul(std::mem::size_of::<f64>()))
            .ok_or_else(|| {
                GsegError::resource_limit(format!(
                    "surface size overflow: n={n}, surfaces={surfaces}"
                ))
            })?;

        if required > limit {
            return Err(GsegError::resource_limit(format!(
                "constraints.max_surface_bytes exceeded: required={required}, limit={limit}, n={n}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Constraints, DEFAULT_MAX_SURFACE_BYTES};

    #[test]
    fn default_caps_surface_memory() {
        let constraints = Constraints::default();
        assert_eq!(constraints.time_budget_ms, None);
        assert_eq!(
            constraints.max_surface_bytes,
            Some(DEFAULT_MAX_SURFACE_BYTES)
        );
        constraints.validate().expect("defaults must validate");
    }

    #[test]
    fn zero_limits_are_rejected() {
        let zero_time = Constraints {
            time_budget_ms: Some(0),
            ..Constraints::default()
        };
        assert!(zero_time.validate().is_err());

        let zero_bytes = Constraints {
            max_surface_bytes: Some(0),
            ..Constraints::default()
        };
        assert!(zero_bytes.validate().is_err());
    }

    #[test]
    fn surface_allocation_check_compares_against_limit() {
        let constraints = Constraints {
            max_surface_bytes: Some(8 * 10 * 10 * 4),
            ..Constraints::default()
        };
        constraints
            .check_surface_allocation(10, 4)
            .expect("exactly at the limit should pass");

        let err = constraints
            .check_surface_allocation(10, 5)
            .expect_err("one surface over the limit should fail");
        assert!(
            err.to_string()
                .contains("constraints.max_surface_bytes exceeded")
        );

        let unlimited = Constraints {
            max_surface_bytes: None,
            ..Constraints::default()
        };
        unlimited
            .check_surface_allocation(100_000, 8)
            .expect("no cap should always pass");
    }
}
