// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GsegError;
use std::fmt;
use std::str::FromStr;

/// Edge-count scan statistic family member.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatKind {
    /// Standardized count of edges crossing the split.
    Original,
    /// Standardized weighted sum of within-group edge counts.
    Weighted,
    /// `max(|Zd|, Zw)`.
    MaxType,
    /// `Zw^2 + Zd^2`.
    Generalized,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Original,
        StatKind::Weighted,
        StatKind::MaxType,
        StatKind::Generalized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Weighted => "weighted",
            Self::MaxType => "max_type",
            Self::Generalized => "generalized",
        }
    }

    /// True for the kinds built from the within-group counts `R1`, `R2`.
    pub fn uses_within_counts(self) -> bool {
        !matches!(self, Self::Original)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKind {
    type Err = GsegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o" | "ori" | "original" => Ok(Self::Original),
            "w" | "wei" | "weighted" => Ok(Self::Weighted),
            "m" | "max" | "max_type" => Ok(Self::MaxType),
            "g" | "gen" | "generalized" => Ok(Self::Generalized),
            other => Err(GsegError::invalid_argument(format!(
                "unknown statistic '{other}'; expected one of o/ori/original, w/wei/weighted, m/max/max_type, g/gen/generalized"
            ))),
        }
    }
}

/// Which statistics a scan computes.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatSelection {
    #[default]
    All,
    Single(StatKind),
}

impl StatSelection {
    pub fn kinds(self) -> Vec<StatKind> {
        match self {
            Self::All => StatKind::ALL.to_vec(),
            Self::Single(kind) => vec![kind],
        }
    }

    pub fn contains(self, kind: StatKind) -> bool {
        match self {
            Self::All => true,
            Self::Single(selected) => selected == kind,
        }
    }

    pub fn needs_within_counts(self) -> bool {
        self.kinds().into_iter().any(StatKind::uses_within_counts)
    }
}

impl From<StatKind> for StatSelection {
    fn from(kind: StatKind) -> Self {
        Self::Single(kind)
    }
}

impl FromStr for StatSelection {
    type Err = GsegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<StatKind>().map(Self::Single)
    }
}

impl fmt::Display for StatSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Single(kind) => kind.fmt(f),
        }
    }
}
