// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gseg::{AnalysisReport, GsegConfig, GsegError, gseg1, gseg2};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Gseg(#[from] GsegError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    InvalidInput(String),
}

impl CliError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Gseg(GsegError::InvalidInput(_)) | Self::InvalidInput(_) => "invalid_input",
            Self::Gseg(GsegError::InvalidArgument(_)) => "invalid_argument",
            Self::Gseg(GsegError::NumericalIssue(_)) => "numerical_issue",
            Self::Gseg(GsegError::ResourceLimit(_)) => "resource_limit",
            Self::Gseg(GsegError::Cancelled) => "cancelled",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Single,
    Interval,
}

/// Dense row-major adjacency matrix read from JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct Adjacency {
    pub n: usize,
    pub values: Vec<f64>,
}

/// Accepts `[[..], ..]` or `{"adjacency": [[..], ..]}`.
pub fn parse_adjacency(value: &Value) -> Result<Adjacency, CliError> {
    let rows = value
        .as_object()
        .and_then(|obj| obj.get("adjacency"))
        .unwrap_or(value)
        .as_array()
        .ok_or_else(|| CliError::invalid_input("adjacency must be an array of rows"))?;

    let n = rows.len();
    let mut values = Vec::with_capacity(n.saturating_mul(n));
    for (i, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| CliError::invalid_input(format!("adjacency[{i}] must be an array")))?;
        if row.len() != n {
            return Err(CliError::invalid_input(format!(
                "adjacency must be square: row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        for (j, item) in row.iter().enumerate() {
            let v = item.as_f64().ok_or_else(|| {
                CliError::invalid_input(format!("adjacency[{i}][{j}] must be a number"))
            })?;
            values.push(v);
        }
    }
    Ok(Adjacency { n, values })
}

pub fn read_json_value(path: &Path) -> Result<Value, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))?;
    serde_json::from_str(raw.as_str())
        .map_err(|source| CliError::json(format!("invalid JSON in '{}'", path.display()), source))
}

pub fn analyze(
    mode: Mode,
    adjacency: &Adjacency,
    config: &GsegConfig,
) -> Result<AnalysisReport, CliError> {
    let report = match mode {
        Mode::Single => gseg1(&adjacency.values, adjacency.n, config)?,
        Mode::Interval => gseg2(&adjacency.values, adjacency.n, config)?,
    };
    Ok(report)
}

pub fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

pub fn crate_name() -> &'static str {
    "gseg-cli"
}
