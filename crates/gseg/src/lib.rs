// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Graph-based changepoint detection.
//!
//! [`gseg1`] looks for a single changepoint and [`gseg2`] for a changed
//! interval in a sequence of observations described by a similarity graph
//! over their order. Both scan the edge-count statistics and attach
//! analytic and/or permutation p-values to the maxima.

pub mod config;
pub mod detector;
pub mod report;

pub use config::GsegConfig;
pub use detector::{GraphDetector, Gseg1, Gseg2};
pub use report::{AnalysisReport, ScanReport};

pub use gseg_core::{
    BudgetMode, CancelToken, Constraints, Diagnostics, ExecutionContext, GsegError,
    ProgressSink, ReproMode, ScanWindow, SimilarityGraph, StatKind, StatSelection,
    TelemetrySink,
};
pub use gseg_pvalue::{AsymptoticConfig, PermutationConfig, QuadratureConfig};

/// Single-changepoint analysis of the dense `n x n` adjacency matrix.
pub fn gseg1(adjacency: &[f64], n: usize, config: &GsegConfig) -> Result<AnalysisReport, GsegError> {
    let constraints = Constraints::default();
    gseg1_with_context(adjacency, n, config, &ExecutionContext::new(&constraints))
}

/// Changed-interval analysis of the dense `n x n` adjacency matrix.
pub fn gseg2(adjacency: &[f64], n: usize, config: &GsegConfig) -> Result<AnalysisReport, GsegError> {
    let constraints = Constraints::default();
    gseg2_with_context(adjacency, n, config, &ExecutionContext::new(&constraints))
}

pub fn gseg1_with_context(
    adjacency: &[f64],
    n: usize,
    config: &GsegConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<AnalysisReport, GsegError> {
    let graph = SimilarityGraph::from_dense(adjacency, n)?;
    Gseg1::new(config.clone())?.detect(&graph, ctx)
}

pub fn gseg2_with_context(
    adjacency: &[f64],
    n: usize,
    config: &GsegConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<AnalysisReport, GsegError> {
    let graph = SimilarityGraph::from_dense(adjacency, n)?;
    Gseg2::new(config.clone())?.detect(&graph, ctx)
}

pub fn crate_name() -> &'static str {
    "gseg"
}
