// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::repro::ReproMode;
use std::borrow::Cow;

/// Diagnostics schema version for analysis run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured diagnostics captured from one `gseg1`/`gseg2` run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    /// Number of graph nodes.
    pub n: usize,
    pub n_edges: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    /// Recovered numeric situations (skew fallbacks, patches, adjusted windows).
    pub notes: Vec<String>,
    /// Outputs the caller should treat with care (undefined curves, soft budget stops).
    pub warnings: Vec<String>,
    pub algorithm: Cow<'static, str>,
    pub seed: Option<u64>,
    pub repro_mode: ReproMode,
    pub thread_count: Option<usize>,
    #[cfg(feature = "serde")]
    pub params_json: Option<serde_json::Value>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            n: 0,
            n_edges: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            notes: vec![],
            warnings: vec![],
            algorithm: Cow::Borrowed(""),
            seed: None,
            repro_mode: ReproMode::Balanced,
            thread_count: None,
            #[cfg(feature = "serde")]
            params_json: None,
        }
    }
}

impl Diagnostics {
    /// Empty diagnostics for `algorithm` run on a graph with `n` nodes and `n_edges` edges.
    pub fn for_run(algorithm: &'static str, n: usize, n_edges: usize) -> Self {
        Self {
            n,
            n_edges,
            algorithm: Cow::Borrowed(algorithm),
            ..Self::default()
        }
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
