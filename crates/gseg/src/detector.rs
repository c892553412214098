// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::GsegConfig;
use crate::report::{AnalysisReport, ScanReport};
use gseg_core::{
    BudgetStatus, Diagnostics, ExecutionContext, GsegError, SimilarityGraph, StatKind,
    WindowBounds,
};
use gseg_pvalue::{AsymptoticPValues, PermutationPValues, permpval2, permval1, pval1, pval2};
use gseg_scan::{changepoint1, changepoint2};
use std::collections::BTreeMap;
use std::time::Instant;

/// Graph detector contract: validated graph in, full analysis out.
pub trait GraphDetector {
    fn detect(
        &self,
        graph: &SimilarityGraph,
        ctx: &ExecutionContext<'_>,
    ) -> Result<AnalysisReport, GsegError>;
}

/// Single-changepoint detector.
#[derive(Clone, Debug)]
pub struct Gseg1 {
    config: GsegConfig,
}

impl Gseg1 {
    pub fn new(config: GsegConfig) -> Result<Self, GsegError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GsegConfig {
        &self.config
    }
}

/// Changed-interval detector.
#[derive(Clone, Debug)]
pub struct Gseg2 {
    config: GsegConfig,
}

impl Gseg2 {
    pub fn new(config: GsegConfig) -> Result<Self, GsegError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GsegConfig {
        &self.config
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Single,
    Interval,
}

impl Mode {
    fn algorithm(self) -> &'static str {
        match self {
            Self::Single => "gseg1",
            Self::Interval => "gseg2",
        }
    }

    fn runtime_key(self) -> &'static str {
        match self {
            Self::Single => "gseg1.runtime_ms",
            Self::Interval => "gseg2.runtime_ms",
        }
    }
}

impl GraphDetector for Gseg1 {
    fn detect(
        &self,
        graph: &SimilarityGraph,
        ctx: &ExecutionContext<'_>,
    ) -> Result<AnalysisReport, GsegError> {
        analyze(Mode::Single, &self.config, graph, ctx)
    }
}

impl GraphDetector for Gseg2 {
    fn detect(
        &self,
        graph: &SimilarityGraph,
        ctx: &ExecutionContext<'_>,
    ) -> Result<AnalysisReport, GsegError> {
        analyze(Mode::Interval, &self.config, graph, ctx)
    }
}

fn note_undefined_maxima(
    observed: &BTreeMap<StatKind, f64>,
    window: WindowBounds,
    warnings: &mut Vec<String>,
) {
    for (kind, z) in observed {
        if z.is_nan() {
            warnings.push(format!(
                "{kind}: statistic is undefined everywhere in [{}, {}]; p-values reported as 1",
                window.n0, window.n1
            ));
        }
    }
}

fn check_budget(
    ctx: &ExecutionContext<'_>,
    started_at: Instant,
    soft_budget_exceeded: &mut bool,
) -> Result<(), GsegError> {
    if ctx.checkpoint(started_at)? == BudgetStatus::ExceededSoftDegrade {
        *soft_budget_exceeded = true;
    }
    Ok(())
}

#[cfg(feature = "rayon")]
fn thread_count(ctx: &ExecutionContext<'_>) -> Option<usize> {
    ctx.parallel_allowed().then(rayon::current_num_threads)
}

#[cfg(not(feature = "rayon"))]
fn thread_count(_ctx: &ExecutionContext<'_>) -> Option<usize> {
    None
}

fn analyze(
    mode: Mode,
    config: &GsegConfig,
    graph: &SimilarityGraph,
    ctx: &ExecutionContext<'_>,
) -> Result<AnalysisReport, GsegError> {
    config.validate()?;
    ctx.constraints.validate()?;
    let started_at = Instant::now();
    let n = graph.n();
    let window = match mode {
        Mode::Single => config.window.resolve(n)?,
        Mode::Interval => config.window.resolve_interval(n)?,
    };
    let mut notes = Vec::new();
    let mut warnings = Vec::new();
    let mut soft_budget_exceeded = false;

    ctx.check_cancelled()?;
    let scan = match mode {
        Mode::Single => ScanReport::Single(changepoint1(graph, config.statistic, window)?),
        Mode::Interval => {
            let scan = changepoint2(graph, config.statistic, window, ctx)?;
            if scan.within_window != scan.window {
                notes.push(format!(
                    "within-count statistics scanned interval lengths [{}, {}]",
                    scan.within_window.n0, scan.within_window.n1
                ));
            }
            ScanReport::Interval(scan)
        }
    };
    ctx.report_progress(0.25);
    let observed = scan.zmax();
    note_undefined_maxima(&observed, window, &mut warnings);

    let mut pval_asym: Option<AsymptoticPValues> = None;
    if config.pval_asym {
        check_budget(ctx, started_at, &mut soft_budget_exceeded)?;
        let stats = graph.stats();
        let result = match mode {
            Mode::Single => pval1(&stats, &observed, window, &config.asymptotic)?,
            Mode::Interval => pval2(&stats, &observed, window, &config.asymptotic)?,
        };
        notes.extend(result.notes.iter().cloned());
        pval_asym = Some(result);
    }
    ctx.report_progress(0.5);

    let mut pval_perm: Option<PermutationPValues> = None;
    if config.pval_perm {
        check_budget(ctx, started_at, &mut soft_budget_exceeded)?;
        let result = match mode {
            Mode::Single => permval1(
                graph,
                config.statistic,
                window,
                &observed,
                &config.permutation,
                ctx,
            )?,
            Mode::Interval => permpval2(
                graph,
                config.statistic,
                window,
                &observed,
                &config.permutation,
                ctx,
            )?,
        };
        notes.push(format!(
            "permutation trials_completed={}, trials_requested={}",
            result.trials_completed, result.trials_requested
        ));
        warnings.extend(result.warnings.iter().cloned());
        pval_perm = Some(result);
    }

    if soft_budget_exceeded {
        warnings.push(
            "budget exceeded under SoftDegrade mode; run continued without dropping p-values"
                .to_string(),
        );
    }

    let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    ctx.record_scalar(mode.runtime_key(), runtime_ms as f64);
    ctx.report_progress(1.0);

    tracing::debug!(
        algorithm = mode.algorithm(),
        n,
        n_edges = graph.n_edges(),
        runtime_ms,
        "graph scan finished"
    );

    let mut diagnostics = Diagnostics::for_run(mode.algorithm(), n, graph.n_edges());
    diagnostics.runtime_ms = Some(runtime_ms);
    diagnostics.notes = notes;
    diagnostics.warnings = warnings;
    diagnostics.seed = config.pval_perm.then_some(config.permutation.seed);
    diagnostics.repro_mode = ctx.repro_mode;
    diagnostics.thread_count = thread_count(ctx);

    #[cfg(feature = "serde")]
    {
        diagnostics.params_json = Some(serde_json::json!({
            "statistic": config.statistic,
            "n0": window.n0,
            "n1": window.n1,
            "pval_asym": config.pval_asym,
            "skew_corr": config.asymptotic.skew_corr,
            "pval_perm": config.pval_perm,
            "permutations": config.permutation.permutations,
        }));
    }

    Ok(AnalysisReport {
        scan,
        pval_asym,
        pval_perm,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::{GraphDetector, Gseg1, Gseg2};
    use crate::config::GsegConfig;
    use gseg_core::{
        BudgetMode, CancelToken, Constraints, ExecutionContext, GsegError, ProgressSink,
        SimilarityGraph, StatKind, TelemetrySink, WindowBounds,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTelemetry {
        keys: Mutex<Vec<&'static str>>,
    }

    impl TelemetrySink for RecordingTelemetry {
        fn record_scalar(&self, key: &'static str, _value: f64) {
            self.keys
                .lock()
                .expect("telemetry mutex should lock")
                .push(key);
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        fractions: Mutex<Vec<f32>>,
    }

    impl ProgressSink for RecordingProgress {
        fn on_progress(&self, fraction: f32) {
            self.fractions
                .lock()
                .expect("progress mutex should lock")
                .push(fraction);
        }
    }

    fn two_cliques(n: usize) -> SimilarityGraph {
        let half = n / 2;
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if (i < half) == (j < half) {
                    edges.push((i, j));
                }
            }
        }
        edges.push((0, n - 1));
        SimilarityGraph::from_edges(n, &edges).expect("valid edges")
    }

    #[test]
    fn single_detector_reports_diagnostics_and_runtime() {
        let graph = two_cliques(16);
        let constraints = Constraints::default();
        let telemetry = RecordingTelemetry::default();
        let ctx = ExecutionContext::new(&constraints).with_telemetry_sink(&telemetry);
        let detector = Gseg1::new(GsegConfig::default()).expect("default config");
        let report = detector.detect(&graph, &ctx).expect("detect");

        let scan = report.scan.as_single().expect("single scan");
        assert_eq!(scan.get(StatKind::Original).expect("original").tauhat, 7);
        assert_eq!(report.diagnostics.algorithm, "gseg1");
        assert_eq!(report.diagnostics.n, 16);
        assert_eq!(report.diagnostics.n_edges, graph.n_edges());
        assert_eq!(report.diagnostics.seed, None);
        assert!(report.pval_asym.is_some());
        assert!(report.pval_perm.is_none());
        let keys = telemetry.keys.lock().expect("telemetry keys").clone();
        assert_eq!(keys, vec!["gseg1.runtime_ms"]);
    }

    #[test]
    fn progress_advances_through_each_stage() {
        let graph = two_cliques(12);
        let constraints = Constraints::default();
        let progress = RecordingProgress::default();
        let ctx = ExecutionContext::new(&constraints).with_progress_sink(&progress);
        Gseg1::new(GsegConfig::default())
            .expect("default config")
            .detect(&graph, &ctx)
            .expect("detect");
        let fractions = progress.fractions.lock().expect("progress fractions").clone();
        assert_eq!(fractions, vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn interval_detector_runs_permutations_when_asked() {
        let graph = two_cliques(12);
        let constraints = Constraints::default();
        let ctx = ExecutionContext::new(&constraints);
        let config = GsegConfig {
            pval_asym: false,
            ..GsegConfig::default()
        }
        .with_permutations(10, 5);
        let report = Gseg2::new(config)
            .expect("valid config")
            .detect(&graph, &ctx)
            .expect("detect");
        assert!(report.scan.as_interval().is_some());
        assert!(report.pval_asym.is_none());
        let perm = report.pval_perm.as_ref().expect("permutation p-values");
        assert_eq!(perm.trials_completed, 10);
        assert_eq!(perm.outcomes.len(), 4);
        assert_eq!(report.diagnostics.seed, Some(5));
        assert_eq!(report.diagnostics.algorithm, "gseg2");
    }

    #[test]
    fn interval_default_window_reaches_n_minus_one() {
        let graph = two_cliques(16);
        let constraints = Constraints::default();
        let ctx = ExecutionContext::new(&constraints);
        let report = Gseg2::new(GsegConfig::default())
            .expect("default config")
            .detect(&graph, &ctx)
            .expect("detect");

        let scan = report.scan.as_interval().expect("interval scan");
        assert_eq!(scan.window, WindowBounds { n0: 1, n1: 15 });
        assert_eq!(scan.within_window, WindowBounds { n0: 1, n1: 13 });
        assert!(
            report
                .diagnostics
                .notes
                .iter()
                .any(|note| note.contains("interval lengths [1, 13]"))
        );
    }

    #[test]
    fn cancellation_aborts_before_scanning() {
        let graph = two_cliques(10);
        let constraints = Constraints::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = ExecutionContext::new(&constraints).with_cancel(&cancel);
        let err = Gseg1::new(GsegConfig::default())
            .expect("default config")
            .detect(&graph, &ctx)
            .expect_err("cancelled");
        assert!(matches!(err, GsegError::Cancelled));
    }

    #[test]
    fn soft_budget_overrun_is_a_warning() {
        let graph = two_cliques(14);
        let constraints = Constraints {
            time_budget_ms: Some(1),
            ..Constraints::default()
        };
        let ctx = ExecutionContext::new(&constraints).with_budget_mode(BudgetMode::SoftDegrade);
        let config = GsegConfig::default().with_permutations(200_000, 1);
        let report = Gseg1::new(config)
            .expect("valid config")
            .detect(&graph, &ctx)
            .expect("soft budget never errors");
        assert!(
            report
                .diagnostics
                .warnings
                .iter()
                .any(|w| w.contains("SoftDegrade"))
        );
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = GsegConfig::default();
        config.asymptotic.quadrature.limit = 0;
        assert!(Gseg1::new(config).is_err());
    }
}
