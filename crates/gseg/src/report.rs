// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gseg_core::{Diagnostics, StatKind};
use gseg_pvalue::{AsymptoticPValues, PermutationPValues};
use gseg_scan::{IntervalScan, SingleScan};
use std::collections::BTreeMap;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum ScanReport {
    Single(SingleScan),
    Interval(IntervalScan),
}

impl ScanReport {
    pub fn zmax(&self) -> BTreeMap<StatKind, f64> {
        match self {
            Self::Single(scan) => scan.zmax(),
            Self::Interval(scan) => scan.zmax(),
        }
    }

    pub fn as_single(&self) -> Option<&SingleScan> {
        match self {
            Self::Single(scan) => Some(scan),
            Self::Interval(_) => None,
        }
    }

    pub fn as_interval(&self) -> Option<&IntervalScan> {
        match self {
            Self::Interval(scan) => Some(scan),
            Self::Single(_) => None,
        }
    }
}

/// Everything one `gseg1`/`gseg2` call produces.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisReport {
    pub scan: ScanReport,
    pub pval_asym: Option<AsymptoticPValues>,
    pub pval_perm: Option<PermutationPValues>,
    pub diagnostics: Diagnostics,
}

impl AnalysisReport {
    pub fn asymptotic_pvalue(&self, kind: StatKind) -> Option<f64> {
        self.pval_asym.as_ref().and_then(|p| p.get(kind))
    }

    pub fn permutation_pvalue(&self, kind: StatKind) -> Option<f64> {
        self.pval_perm
            .as_ref()
            .and_then(|p| p.get(kind))
            .map(|outcome| outcome.pval)
    }
}
