// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GsegError;

/// Smallest graph the scan statistics are defined for.
pub const MIN_NODES: usize = 4;

/// Caller-facing candidate window; `None` selects the 5% / 95% defaults.
///
/// For the single-changepoint scan the bounds are split indices; for the
/// interval scan they bound the interval length.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanWindow {
    pub n0: Option<usize>,
    pub n1: Option<usize>,
}

impl ScanWindow {
    pub fn new(n0: Option<usize>, n1: Option<usize>) -> Self {
        Self { n0, n1 }
    }

    /// Resolves defaults and clamps explicit bounds to `[2, n - 2]`.
    ///
    /// Defaults are `ceil(0.05 n)` and `floor(0.95 n)`; the upper default is
    /// also capped at `n - 2` so the degenerate last split never enters a scan.
    pub fn resolve(&self, n: usize) -> Result<WindowBounds, GsegError> {
        if n < MIN_NODES {
            return Err(GsegError::invalid_input(format!(
                "graph must have at least {MIN_NODES} nodes; got n={n}"
            )));
        }

        let n0 = match self.n0 {
            None => n.div_ceil(20).max(1),
            Some(v) => v.max(2),
        };
        let n1 = match self.n1 {
            None => (n * 19 / 20).min(n - 2),
            Some(v) => v.min(n - 2),
        };

        if n0 > n1 {
            return Err(GsegError::invalid_argument(format!(
                "window is empty after resolution: n0={n0} > n1={n1} (n={n})"
            )));
        }
        Ok(WindowBounds { n0, n1 })
    }

    /// Interval-length window for the interval scan.
    ///
    /// Same as [`ScanWindow::resolve`] except that the default upper bound
    /// stays at `floor(0.95 n)` (at most `n - 1`). Intervals `(0, n - 1]` are
    /// proper subsets of the sequence, and for small graphs this default is
    /// what pushes the within-count statistics down to `n - 3` through
    /// [`WindowBounds::interval_adjusted`].
    pub fn resolve_interval(&self, n: usize) -> Result<WindowBounds, GsegError> {
        let mut bounds = self.resolve(n)?;
        if self.n1.is_none() {
            bounds.n1 = (n * 19 / 20).min(n - 1);
        }
        Ok(bounds)
    }
}

/// Resolved inclusive window `[n0, n1]`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowBounds {
    pub n0: usize,
    pub n1: usize,
}

impl WindowBounds {
    /// Checks that the window can index a scan over `n` nodes.
    pub fn new(n0: usize, n1: usize, n: usize) -> Result<Self, GsegError> {
        if n0 > n1 {
            return Err(GsegError::invalid_argument(format!(
                "window requires n0 <= n1; got n0={n0}, n1={n1}"
            )));
        }
        if n1 >= n {
            return Err(GsegError::invalid_argument(format!(
                "window upper bound must be < n; got n1={n1}, n={n}"
            )));
        }
        Ok(Self { n0, n1 })
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.n0..=self.n1).contains(&index)
    }

    /// Window used by the interval scan for the within-count statistics.
    ///
    /// `n0 <= 1` becomes `1` and `n1 >= n - 1` becomes `n - 3`. The result can
    /// be empty (`n0 > n1`) for very small graphs.
    pub fn interval_adjusted(&self, n: usize) -> Self {
        let n0 = self.n0.max(1);
        let n1 = if self.n1 + 1 >= n {
            n.saturating_sub(3)
        } else {
            self.n1
        };
        Self { n0, n1 }
    }

    pub fn is_empty(&self) -> bool {
        self.n0 > self.n1
    }
}
