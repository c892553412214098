// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GsegError;
use crate::constraints::Constraints;
use crate::control::{BudgetMode, BudgetStatus, CancelToken};
use crate::observability::{ProgressSink, TelemetrySink};
use crate::repro::ReproMode;
use std::time::Instant;

/// Limits, scheduling policy and observer hooks for one `gseg1`/`gseg2` call.
///
/// The scans, the permutation engine and the detectors all poll the same
/// context, so one cancel token or time budget stops the whole analysis.
pub struct ExecutionContext<'a> {
    pub constraints: &'a Constraints,
    pub cancel: Option<&'a CancelToken>,
    pub budget_mode: BudgetMode,
    pub repro_mode: ReproMode,
    pub progress: Option<&'a dyn ProgressSink>,
    pub telemetry: Option<&'a dyn TelemetrySink>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(constraints: &'a Constraints) -> Self {
        Self {
            constraints,
            cancel: None,
            budget_mode: BudgetMode::HardFail,
            repro_mode: ReproMode::Balanced,
            progress: None,
            telemetry: None,
        }
    }

    pub fn with_cancel(self, cancel: &'a CancelToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    pub fn with_budget_mode(self, budget_mode: BudgetMode) -> Self {
        Self {
            budget_mode,
            ..self
        }
    }

    pub fn with_repro_mode(self, repro_mode: ReproMode) -> Self {
        Self { repro_mode, ..self }
    }

    pub fn with_progress_sink(self, progress: &'a dyn ProgressSink) -> Self {
        Self {
            progress: Some(progress),
            ..self
        }
    }

    pub fn with_telemetry_sink(self, telemetry: &'a dyn TelemetrySink) -> Self {
        Self {
            telemetry: Some(telemetry),
            ..self
        }
    }

    pub fn check_cancelled(&self) -> Result<(), GsegError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(GsegError::cancelled()),
            _ => Ok(()),
        }
    }

    /// Polls cancellation on rows/trials that are multiples of `every`.
    pub fn check_cancelled_every(&self, iteration: usize, every: usize) -> Result<(), GsegError> {
        if iteration.is_multiple_of(every.max(1)) {
            self.check_cancelled()?;
        }
        Ok(())
    }

    /// Whether independent units of work may be spread across threads.
    pub fn parallel_allowed(&self) -> bool {
        self.repro_mode.allows_parallel()
    }

    /// Whether a batch may run without any per-unit checkpoint.
    ///
    /// A cancel hook or a time budget needs the sequential loop so the run
    /// can stop between units.
    pub fn fan_out_allowed(&self) -> bool {
        self.parallel_allowed() && self.cancel.is_none() && self.constraints.time_budget_ms.is_none()
    }

    /// Cancellation first, then elapsed time against `constraints.time_budget_ms`.
    pub fn checkpoint(&self, started_at: Instant) -> Result<BudgetStatus, GsegError> {
        self.check_cancelled()?;
        self.budget_status(started_at)
    }

    fn budget_status(&self, started_at: Instant) -> Result<BudgetStatus, GsegError> {
        let elapsed_ms = started_at.elapsed().as_millis();
        match (self.constraints.time_budget_ms, self.budget_mode) {
            (Some(limit_ms), mode) if elapsed_ms > u128::from(limit_ms) => match mode {
                BudgetMode::SoftDegrade => Ok(BudgetStatus::ExceededSoftDegrade),
                BudgetMode::HardFail => Err(GsegError::resource_limit(format!(
                    "time budget of {limit_ms} ms exceeded after {elapsed_ms} ms"
                ))),
            },
            _ => Ok(BudgetStatus::WithinBudget),
        }
    }

    /// Forwards finite fractions, clamped to `[0, 1]`, to the progress sink.
    pub fn report_progress(&self, fraction: f32) {
        if let Some(sink) = self.progress.filter(|_| fraction.is_finite()) {
            sink.on_progress(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn record_scalar(&self, key: &'static str, value: f64) {
        if let Some(sink) = self.telemetry {
            sink.record_scalar(key, value);
        }
    }
}
