// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared graph types, configuration and run-control primitives for the
//! gseg crates.

pub mod constraints;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod graph;
pub mod observability;
pub mod repro;
pub mod statistic;
pub mod window;

pub use constraints::{Constraints, DEFAULT_MAX_SURFACE_BYTES};
pub use control::{BudgetMode, BudgetStatus, CancelToken};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
pub use error::{GsegError, checked_increment};
pub use execution_context::ExecutionContext;
pub use graph::{GraphStats, SimilarityGraph};
pub use observability::{ProgressSink, TelemetrySink};
pub use repro::ReproMode;
pub use statistic::{StatKind, StatSelection};
pub use window::{MIN_NODES, ScanWindow, WindowBounds};

pub fn crate_name() -> &'static str {
    "gseg-core"
}
