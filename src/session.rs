//! Runs a whole loading program through the recovery engine.

use std::time::Duration;

use log::Level;

use crate::algorithm::{Algorithm, ExtensionRegistry, ExtensionSlot};
use crate::error::{AnalyzeError, Result};
use crate::options::{AnalyzeOptions, OptionOverrides};
use crate::planner::{plan_protocol, plan_uniform};
use crate::recovery::{install_algorithm, RecoveryEngine, RecoveryOutcome};
use crate::solver::{AnalysisMode, NodeTag, Solver};
use crate::state::{ControlTarget, RecoveryStats, SessionState};

/// Overall outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunStatus {
    /// Every planned segment converged.
    Succeeded,
    /// Recovery was exhausted on a segment; later segments were not attempted.
    Failed {
        /// Zero-based index of the failing segment.
        segment: usize,
        /// Planned step of the failing segment.
        step: f64,
    },
}

/// Summary returned by a run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub mode: AnalysisMode,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    pub segments_completed: usize,
    pub segments_total: usize,
    pub stats: RecoveryStats,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    fn from_state(status: RunStatus, mode: AnalysisMode, state: &SessionState) -> Self {
        Self {
            status,
            mode,
            elapsed: state.elapsed(),
            segments_completed: state.completed_segments(),
            segments_total: state.total_segments(),
            stats: *state.stats(),
        }
    }
}

/// Owns a solver and runs loading programs on it with automatic recovery.
#[derive(Debug)]
pub struct AnalysisSession<S: Solver> {
    solver: S,
    options: AnalyzeOptions,
    extensions: ExtensionRegistry<S>,
}

impl<S: Solver> AnalysisSession<S> {
    pub fn new(solver: S, options: AnalyzeOptions) -> Self {
        Self {
            solver,
            options,
            extensions: ExtensionRegistry::new(),
        }
    }

    /// Registers the algorithm installed when a user slot code (90, 91, 92) is selected.
    pub fn register_extension<F>(&mut self, slot: ExtensionSlot, callback: F) -> &mut Self
    where
        F: FnMut(&mut S) -> Result<()> + 'static,
    {
        self.extensions.register(slot, callback);
        self
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.options
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    /// Runs `npts` time steps of length `dt` (or the configured initial step).
    pub fn run_transient(&mut self, dt: f64, npts: usize) -> Result<RunReport> {
        if !(dt > 0.0) {
            return Err(AnalyzeError::non_positive("dt", dt));
        }
        if !dt.is_finite() {
            return Err(AnalyzeError::NonFiniteValue {
                context: "dt",
                value: dt,
            });
        }
        if npts == 0 {
            return Err(AnalyzeError::ZeroSegments);
        }
        let algorithms = self.prepare()?;
        let segments = plan_uniform(self.options.initial_step.unwrap_or(dt), npts);

        self.install_baseline(&algorithms)?;
        self.solver.set_analysis_mode(AnalysisMode::Transient)?;

        let state = SessionState::new(&self.options, segments.len());
        self.drive(AnalysisMode::Transient, &segments, state)
    }

    /// Runs a displacement-controlled protocol on `dof` of `node`.
    ///
    /// `targets` are cumulative displacements; the first should be positive.
    pub fn run_static(
        &mut self,
        node: NodeTag,
        dof: usize,
        max_step: f64,
        targets: &[f64],
    ) -> Result<RunReport> {
        let segments = plan_protocol(max_step, targets)?;
        let algorithms = self.prepare()?;
        let initial_step = self
            .options
            .initial_step
            .unwrap_or_else(|| match targets.first() {
                Some(&first) if first > 0.0 && first < max_step => first,
                _ => max_step,
            });
        if segments.is_empty() {
            log::warn!("protocol {targets:?} moves the control node nowhere");
        }

        self.install_baseline(&algorithms)?;
        self.solver
            .set_displacement_control(node, dof, initial_step)?;
        self.solver.set_analysis_mode(AnalysisMode::Static)?;

        let state = SessionState::new(&self.options, segments.len())
            .with_control(ControlTarget { node, dof }, initial_step);
        self.drive(AnalysisMode::Static, &segments, state)
    }

    fn prepare(&self) -> Result<Vec<Algorithm>> {
        let algorithms = self.options.validate()?;
        self.extensions.ensure_registered(&algorithms)?;
        log::info!("control parameters: {:?}", self.options);
        Ok(algorithms)
    }

    fn install_baseline(&mut self, algorithms: &[Algorithm]) -> Result<()> {
        self.solver
            .set_convergence_test(&self.options.baseline_test())?;
        install_algorithm(&mut self.solver, &mut self.extensions, &algorithms[0])
    }

    fn drive(
        &mut self,
        mode: AnalysisMode,
        segments: &[f64],
        mut state: SessionState,
    ) -> Result<RunReport> {
        let level = if self.options.debug_mode {
            Level::Info
        } else {
            Level::Debug
        };
        let mut engine = RecoveryEngine::new(&mut self.solver, &self.options, &mut self.extensions)?;

        for (index, &step) in segments.iter().enumerate() {
            if engine.attempt(step, &mut state)? == RecoveryOutcome::Failed {
                log::warn!(
                    "{mode:?} analysis failed at segment {}/{} (step {step}), elapsed {:.3?}",
                    index + 1,
                    segments.len(),
                    state.elapsed()
                );
                let status = RunStatus::Failed {
                    segment: index,
                    step,
                };
                return Ok(RunReport::from_state(status, mode, &state));
            }
            state.complete_segment();
            log::log!(level, "progress {:.4}", state.progress());
        }

        log::info!(
            "{mode:?} analysis finished, {} segments in {:.3?}",
            segments.len(),
            state.elapsed()
        );
        Ok(RunReport::from_state(RunStatus::Succeeded, mode, &state))
    }
}

/// Runs a time-history analysis of `npts` steps of `dt` on `solver`.
pub fn run_transient<S: Solver>(
    solver: S,
    dt: f64,
    npts: usize,
    overrides: Option<&OptionOverrides>,
) -> Result<RunReport> {
    let options = effective_options(overrides);
    AnalysisSession::new(solver, options).run_transient(dt, npts)
}

/// Runs a displacement-controlled analysis through `targets` on `solver`.
pub fn run_static<S: Solver>(
    solver: S,
    node: NodeTag,
    dof: usize,
    max_step: f64,
    targets: &[f64],
    overrides: Option<&OptionOverrides>,
) -> Result<RunReport> {
    let options = effective_options(overrides);
    AnalysisSession::new(solver, options).run_static(node, dof, max_step, targets)
}

fn effective_options(overrides: Option<&OptionOverrides>) -> AnalyzeOptions {
    match overrides {
        Some(overrides) => AnalyzeOptions::default().merged(overrides),
        None => AnalyzeOptions::default(),
    }
}
