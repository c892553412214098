// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Edge-count scan engines: one changepoint (`changepoint1`) and one changed
//! interval (`changepoint2`).

pub mod interval;
pub mod moments;
pub mod single;

pub use interval::{IntervalScan, IntervalScanResult, StatSurface, changepoint2, retained_surfaces};
pub use moments::{CrossMoments, NullMoments, WithinMoments, hypergeometric_weight};
pub use single::{SingleScan, SingleScanResult, SplitCounts, argmax_in_window, changepoint1, split_counts};

pub fn crate_name() -> &'static str {
    "gseg-scan"
}
