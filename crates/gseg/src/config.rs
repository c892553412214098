// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gseg_core::{GsegError, ScanWindow, StatKind, StatSelection};
use gseg_pvalue::{AsymptoticConfig, PermutationConfig};

/// Configuration shared by [`crate::Gseg1`] and [`crate::Gseg2`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct GsegConfig {
    pub statistic: StatSelection,
    pub window: ScanWindow,
    pub pval_asym: bool,
    pub asymptotic: AsymptoticConfig,
    pub pval_perm: bool,
    pub permutation: PermutationConfig,
}

impl Default for GsegConfig {
    fn default() -> Self {
        Self {
            statistic: StatSelection::All,
            window: ScanWindow::default(),
            pval_asym: true,
            asymptotic: AsymptoticConfig::default(),
            pval_perm: false,
            permutation: PermutationConfig::default(),
        }
    }
}

impl GsegConfig {
    pub fn validate(&self) -> Result<(), GsegError> {
        if self.pval_asym {
            self.asymptotic.validate()?;
        }
        if self.pval_perm {
            self.permutation.validate()?;
        }
        Ok(())
    }

    /// Selection from a user string: `all` or any synonym accepted by
    /// [`StatKind`].
    pub fn parse_statistic(raw: &str) -> Result<StatSelection, GsegError> {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Ok(StatSelection::All);
        }
        raw.parse::<StatKind>().map(StatSelection::Single)
    }

    pub fn with_statistic(mut self, raw: &str) -> Result<Self, GsegError> {
        self.statistic = Self::parse_statistic(raw)?;
        Ok(self)
    }

    pub fn with_window(mut self, n0: Option<usize>, n1: Option<usize>) -> Self {
        self.window = ScanWindow::new(n0, n1);
        self
    }

    pub fn with_permutations(mut self, permutations: usize, seed: u64) -> Self {
        self.pval_perm = true;
        self.permutation = PermutationConfig { permutations, seed };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::GsegConfig;
    use gseg_core::{GsegError, StatKind, StatSelection};

    #[test]
    fn defaults_match_the_documented_values() {
        let config = GsegConfig::default();
        assert_eq!(config.statistic, StatSelection::All);
        assert_eq!(config.window.n0, None);
        assert_eq!(config.window.n1, None);
        assert!(config.pval_asym);
        assert!(config.asymptotic.skew_corr);
        assert!(!config.pval_perm);
        assert_eq!(config.permutation.permutations, 100);
        assert_eq!(config.permutation.seed, 0);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn statistic_synonyms_parse_once() {
        for (raw, expected) in [
            ("all", StatSelection::All),
            ("ALL", StatSelection::All),
            ("o", StatSelection::Single(StatKind::Original)),
            ("wei", StatSelection::Single(StatKind::Weighted)),
            ("max", StatSelection::Single(StatKind::MaxType)),
            ("m", StatSelection::Single(StatKind::MaxType)),
            ("generalized", StatSelection::Single(StatKind::Generalized)),
        ] {
            assert_eq!(GsegConfig::parse_statistic(raw).expect(raw), expected);
        }
        let err = GsegConfig::default()
            .with_statistic("maxm")
            .expect_err("unknown statistic must fail");
        assert!(matches!(err, GsegError::InvalidArgument(_)));
    }

    #[test]
    fn zero_permutations_only_fail_when_requested() {
        let mut config = GsegConfig::default();
        config.permutation.permutations = 0;
        config.validate().expect("permutations unused");
        let err = config
            .clone()
            .with_permutations(0, 3)
            .validate()
            .expect_err("zero permutations must fail");
        assert!(err.to_string().contains("permutations"));
    }
}
