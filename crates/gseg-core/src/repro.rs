// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Reproducibility mode controlling how work is scheduled.
///
/// Numeric output never depends on the mode: permutation trials own their
/// RNG streams and interval rows are merged in index order. `Strict` only
/// forbids spreading work across threads.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReproMode {
    /// Run everything on the calling thread.
    Strict,
    #[default]
    Balanced,
    Fast,
}

impl ReproMode {
    pub fn allows_parallel(self) -> bool {
        !matches!(self, Self::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::ReproMode;

    #[test]
    fn only_strict_mode_keeps_work_on_the_calling_thread() {
        assert_eq!(ReproMode::default(), ReproMode::Balanced);
        let parallel: Vec<bool> = [ReproMode::Strict, ReproMode::Balanced, ReproMode::Fast]
            .into_iter()
            .map(ReproMode::allows_parallel)
            .collect();
        assert_eq!(parallel, vec![false, true, true]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn modes_use_their_variant_names_in_json() {
        let encoded = serde_json::to_string(&[ReproMode::Strict, ReproMode::Fast])
            .expect("repro modes should serialize");
        assert_eq!(encoded, r#"["Strict","Fast"]"#);
        let decoded: ReproMode =
            serde_json::from_str("\"Balanced\"").expect("repro mode should deserialize");
        assert_eq!(decoded, ReproMode::Balanced);
    }
}
