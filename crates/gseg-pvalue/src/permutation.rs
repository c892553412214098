// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Monte-Carlo permutation p-values.
//!
//! Each trial relabels the nodes with a uniformly random permutation, reruns
//! the scan over the same window and records the maximum of every requested
//! statistic. Trial `k` draws from its own `ChaCha8Rng`, so the sequence of
//! maxima only depends on the seed, never on scheduling.

use gseg_core::{
    BudgetStatus, ExecutionContext, GsegError, SimilarityGraph, StatKind, StatSelection,
    WindowBounds, checked_increment,
};
use gseg_scan::{changepoint1, changepoint2};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Instant;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub const DEFAULT_PERMUTATIONS: usize = 100;

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermutationConfig {
    /// Number of trials `B`.
    pub permutations: usize,
    pub seed: u64,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            seed: 0,
        }
    }
}

impl PermutationConfig {
    pub fn validate(&self) -> Result<(), GsegError> {
        if self.permutations == 0 {
            return Err(GsegError::invalid_argument(
                "permutations must be >= 1; got 0",
            ));
        }
        Ok(())
    }
}

/// Null distribution of one statistic's maximum.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PermutationOutcome {
    pub pval: f64,
    /// Trial maxima in ascending order (`NaN` last).
    pub max_statistics: Vec<f64>,
    /// `(threshold, 1 - k / B)` for the `k`-th smallest maximum.
    pub curve: Vec<(f64, f64)>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PermutationPValues {
    pub outcomes: BTreeMap<StatKind, PermutationOutcome>,
    pub trials_requested: usize,
    pub trials_completed: usize,
    pub stopped_early: bool,
    pub warnings: Vec<String>,
}

impl PermutationPValues {
    pub fn get(&self, kind: StatKind) -> Option<&PermutationOutcome> {
        self.outcomes.get(&kind)
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// RNG seed owned by trial `trial` of a run seeded with `seed`.
pub fn trial_seed(seed: u64, trial: usize) -> u64 {
    let offset = (trial as u64).wrapping_add(1).wrapping_mul(GOLDEN_GAMMA);
    splitmix64(seed.wrapping_add(offset))
}

/// Node relabelling used by trial `trial`: node `k` moves to `index[k]`.
pub fn trial_permutation(n: usize, seed: u64, trial: usize) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(trial_seed(seed, trial));
    let mut index: Vec<usize> = (0..n).collect();
    index.shuffle(&mut rng);
    index
}

/// Permutation p-values for the single-changepoint scan.
///
/// `observed` holds the maxima of the unpermuted scan; one outcome is
/// produced per entry.
pub fn permval1(
    graph: &SimilarityGraph,
    selection: StatSelection,
    window: WindowBounds,
    observed: &BTreeMap<StatKind, f64>,
    config: &PermutationConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<PermutationPValues, GsegError> {
    run(graph, observed, config, ctx, |permuted, _| {
        Ok(changepoint1(permuted, selection, window)?.zmax())
    })
}

/// Permutation p-values for the interval scan.
pub fn permpval2(
    graph: &SimilarityGraph,
    selection: StatSelection,
    window: WindowBounds,
    observed: &BTreeMap<StatKind, f64>,
    config: &PermutationConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<PermutationPValues, GsegError> {
    run(graph, observed, config, ctx, |permuted, inner| {
        Ok(changepoint2(permuted, selection, window, inner)?.zmax())
    })
}

struct Trials {
    maxima: Vec<BTreeMap<StatKind, f64>>,
    stopped_early: bool,
}

fn run<F>(
    graph: &SimilarityGraph,
    observed: &BTreeMap<StatKind, f64>,
    config: &PermutationConfig,
    ctx: &ExecutionContext<'_>,
    scan: F,
) -> Result<PermutationPValues, GsegError>
where
    F: Fn(&SimilarityGraph, &ExecutionContext<'_>) -> Result<BTreeMap<StatKind, f64>, GsegError>
        + Sync,
{
    config.validate()?;
    let n = graph.n();
    let (constraints, cancel) = (ctx.constraints, ctx.cancel);
    let (budget_mode, repro_mode) = (ctx.budget_mode, ctx.repro_mode);
    let trial = |k: usize| {
        let permuted = graph.relabel(&trial_permutation(n, config.seed, k))?;
        // sinks stay with the outer run; trials only see limits and cancellation
        let inner = ExecutionContext {
            constraints,
            cancel,
            budget_mode,
            repro_mode,
            progress: None,
            telemetry: None,
        };
        scan(&permuted, &inner)
    };

    let trials = run_trials(config.permutations, ctx, trial)?;
    let completed = trials.maxima.len();
    let mut warnings = Vec::new();
    if trials.stopped_early {
        let message = format!(
            "time budget exceeded under SoftDegrade mode; permutation stopped after {completed} of {} trials",
            config.permutations
        );
        tracing::warn!(completed, requested = config.permutations, "{message}");
        warnings.push(message);
    }

    let mut outcomes = BTreeMap::new();
    for (&kind, &obs) in observed {
        let maxima: Vec<f64> = trials
            .maxima
            .iter()
            .map(|m| m.get(&kind).copied().unwrap_or(f64::NAN))
            .collect();
        if obs.is_nan() {
            warnings.push(format!(
                "{kind}: observed maximum is undefined; permutation p-value reported as 1"
            ));
        }
        outcomes.insert(kind, outcome(obs, maxima));
    }

    ctx.record_scalar("permutation.trials_completed", completed as f64);
    ctx.report_progress(1.0);

    Ok(PermutationPValues {
        outcomes,
        trials_requested: config.permutations,
        trials_completed: completed,
        stopped_early: trials.stopped_early,
        warnings,
    })
}

fn run_trials<T>(
    permutations: usize,
    ctx: &ExecutionContext<'_>,
    trial: T,
) -> Result<Trials, GsegError>
where
    T: Fn(usize) -> Result<BTreeMap<StatKind, f64>, GsegError> + Sync,
{
    #[cfg(feature = "rayon")]
    if ctx.fan_out_allowed() {
        let maxima = (0..permutations)
            .into_par_iter()
            .map(&trial)
            .collect::<Result<Vec<_>, GsegError>>()?;
        return Ok(Trials {
            maxima,
            stopped_early: false,
        });
    }

    let started_at = Instant::now();
    let mut maxima = Vec::with_capacity(permutations);
    let mut completed = 0usize;
    for k in 0..permutations {
        if ctx.checkpoint(started_at)? == BudgetStatus::ExceededSoftDegrade {
            return Ok(Trials {
                maxima,
                stopped_early: true,
            });
        }
        maxima.push(trial(k)?);
        checked_increment(&mut completed, "permutation trials")?;
        ctx.report_progress(completed as f32 / permutations as f32);
    }
    Ok(Trials {
        maxima,
        stopped_early: false,
    })
}

fn outcome(observed: f64, mut maxima: Vec<f64>) -> PermutationOutcome {
    let trials = maxima.len();
    let pval = if observed.is_nan() || trials == 0 {
        1.0
    } else {
        maxima.iter().filter(|&&z| z >= observed).count() as f64 / trials as f64
    };
    maxima.sort_by(f64::total_cmp);
    let curve = maxima
        .iter()
        .enumerate()
        .map(|(k, &z)| (z, 1.0 - k as f64 / trials as f64))
        .collect();
    PermutationOutcome {
        pval,
        max_statistics: maxima,
        curve,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        PermutationConfig, outcome, permpval2, permval1, trial_permutation, trial_seed,
    };
    use gseg_core::{
        BudgetMode, CancelToken, Constraints, ExecutionContext, GsegError, SimilarityGraph,
        StatKind, StatSelection, WindowBounds,
    };
    use std::collections::BTreeMap;

    fn ring(n: usize) -> SimilarityGraph {
        let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        SimilarityGraph::from_edges(n, &edges).expect("valid ring")
    }

    #[test]
    fn config_validation_rejects_zero_trials() {
        let config = PermutationConfig::default();
        assert_eq!(config.permutations, 100);
        assert_eq!(config.seed, 0);
        config.validate().expect("defaults must validate");
        let err = PermutationConfig {
            permutations: 0,
            seed: 0,
        }
        .validate()
        .expect_err("zero trials must fail");
        assert!(matches!(err, GsegError::InvalidArgument(_)));
    }

    #[test]
    fn trial_permutations_are_seeded_and_distinct() {
        let a = trial_permutation(30, 9, 0);
        assert_eq!(a, trial_permutation(30, 9, 0));
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..30).collect::<Vec<_>>());
        assert_ne!(a, trial_permutation(30, 9, 1));
        assert_ne!(a, trial_permutation(30, 10, 0));
        assert_ne!(trial_seed(0, 0), trial_seed(0, 1));
    }

    #[test]
    fn outcome_counts_ties_and_builds_the_tail_curve() {
        let got = outcome(2.0, vec![3.0, 1.0, 2.0, 0.5]);
        assert_eq!(got.pval, 0.5);
        assert_eq!(got.max_statistics, vec![0.5, 1.0, 2.0, 3.0]);
        assert_eq!(
            got.curve,
            vec![(0.5, 1.0), (1.0, 0.75), (2.0, 0.5), (3.0, 0.25)]
        );
        assert_eq!(outcome(f64::NAN, vec![1.0]).pval, 1.0);
        assert_eq!(outcome(1.0, vec![]).pval, 1.0);
    }

    #[test]
    fn single_permutation_run_is_reproducible() {
        let graph = ring(16);
        let window = WindowBounds::new(2, 13, 16).expect("valid window");
        let observed = BTreeMap::from([(StatKind::Original, 1.5), (StatKind::Weighted, 1.0)]);
        let config = PermutationConfig {
            permutations: 20,
            seed: 4,
        };
        let constraints = Constraints::default();
        let ctx = ExecutionContext::new(&constraints);
        let first = permval1(&graph, StatSelection::All, window, &observed, &config, &ctx)
            .expect("permutation should run");
        let second = permval1(&graph, StatSelection::All, window, &observed, &config, &ctx)
            .expect("permutation should run");
        assert_eq!(first, second);
        assert_eq!(first.trials_completed, 20);
        assert_eq!(first.outcomes.len(), 2);
        for outcome in first.outcomes.values() {
            assert_eq!(outcome.max_statistics.len(), 20);
            assert!((0.0..=1.0).contains(&outcome.pval));
        }
    }

    #[test]
    fn cancelled_run_returns_cancelled() {
        let graph = ring(12);
        let window = WindowBounds::new(2, 10, 12).expect("valid window");
        let observed = BTreeMap::from([(StatKind::Original, 1.0)]);
        let constraints = Constraints::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = ExecutionContext::new(&constraints).with_cancel(&cancel);
        let err = permpval2(
            &graph,
            StatSelection::Single(StatKind::Original),
            window,
            &observed,
            &PermutationConfig::default(),
            &ctx,
        )
        .expect_err("cancelled token must stop the run");
        assert!(matches!(err, GsegError::Cancelled));
    }

    #[test]
    fn soft_budget_keeps_completed_trials() {
        let graph = ring(12);
        let window = WindowBounds::new(2, 10, 12).expect("valid window");
        let observed = BTreeMap::from([(StatKind::Original, 1.0)]);
        let constraints = Constraints {
            time_budget_ms: Some(1),
            ..Constraints::default()
        };
        let ctx = ExecutionContext::new(&constraints).with_budget_mode(BudgetMode::SoftDegrade);
        let config = PermutationConfig {
            permutations: 1_000_000,
            seed: 1,
        };
        let got = permval1(
            &graph,
            StatSelection::Single(StatKind::Original),
            window,
            &observed,
            &config,
            &ctx,
        )
        .expect("soft budget should not error");
        assert!(got.stopped_early);
        assert!(got.trials_completed < config.permutations);
        assert!(got.warnings.iter().any(|w| w.contains("SoftDegrade")));
    }
}
