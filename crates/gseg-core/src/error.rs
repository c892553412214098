// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error type shared by every gseg crate.
///
/// Degenerate numeric regions (zero variance, undefined skewness
/// corrections) are recovered locally by the engines and never reach the
/// caller through this type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GsegError {
    /// Caller-supplied data violates the input contract (shape, symmetry,
    /// finiteness, graph size).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value is not recognized or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A numerical routine was asked to work on values it cannot handle.
    #[error("numerical issue: {0}")]
    NumericalIssue(String),

    /// Memory cap, time budget or counter limit exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// Cancellation was requested through a [`crate::CancelToken`].
    #[error("cancelled")]
    Cancelled,
}

impl GsegError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn numerical_issue(message: impl Into<String>) -> Self {
        Self::NumericalIssue(message.into())
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::ResourceLimit(message.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }
}

/// Increments a bookkeeping counter, failing instead of wrapping.
pub fn checked_increment(counter: &mut usize, name: &str) -> Result<(), GsegError> {
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| GsegError::resource_limit(format!("{name} counter overflow")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{GsegError, checked_increment};

    #[test]
    fn display_strings_are_prefixed_by_category() {
        assert_eq!(
            GsegError::invalid_input("matrix is not square").to_string(),
            "invalid input: matrix is not square"
        );
        assert_eq!(
            GsegError::invalid_argument("unknown statistic 'foo'").to_string(),
            "invalid argument: unknown statistic 'foo'"
        );
        assert_eq!(
            GsegError::resource_limit("surface too large").to_string(),
            "resource limit exceeded: surface too large"
        );
        assert_eq!(GsegError::cancelled().to_string(), "cancelled");
    }

    #[test]
    fn checked_increment_reports_overflow() {
        let mut counter = usize::MAX - 1;
        checked_increment(&mut counter, "trials").expect("one step below max should succeed");
        assert_eq!(counter, usize::MAX);

        let err = checked_increment(&mut counter, "trials").expect_err("overflow must fail");
        assert_eq!(
            err.to_string(),
            "resource limit exceeded: trials counter overflow"
        );
    }
}
