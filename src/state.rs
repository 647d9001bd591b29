//! Mutable context threaded through a run.

use std::time::{Duration, Instant};

use crate::options::AnalyzeOptions;
use crate::solver::NodeTag;

/// Degree of freedom driven by displacement control in static runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlTarget {
    pub node: NodeTag,
    pub dof: usize,
}

/// Counters describing how much recovery work a run needed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Calls to `Solver::advance`.
    pub trial_steps: usize,
    /// Trial steps that did not converge.
    pub failed_trials: usize,
    pub iteration_enlargements: usize,
    pub algorithm_switches: usize,
    pub bisections: usize,
    pub tolerance_loosenings: usize,
    /// Deepest bisection level reached by any segment.
    pub deepest_bisection: usize,
}

/// Solver-facing state of a run.
///
/// The `active_*` fields always hold what was last applied to the solver,
/// which lets the recovery engine skip redundant reconfiguration.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub(crate) active_algorithm: usize,
    pub(crate) active_iterations: usize,
    pub(crate) active_tolerance: f64,
    pub(crate) active_step: Option<f64>,
    pub(crate) control: Option<ControlTarget>,
    pub(crate) trials_since_report: usize,
    pub(crate) completed_segments: usize,
    pub(crate) total_segments: usize,
    pub(crate) started: Instant,
    pub(crate) stats: RecoveryStats,
}

impl SessionState {
    /// State right after the baseline configuration of `options` was applied.
    pub fn new(options: &AnalyzeOptions, total_segments: usize) -> Self {
        Self {
            active_algorithm: 0,
            active_iterations: options.test_iterations,
            active_tolerance: options.test_tolerance,
            active_step: None,
            control: None,
            trials_since_report: 0,
            completed_segments: 0,
            total_segments,
            started: Instant::now(),
            stats: RecoveryStats::default(),
        }
    }

    /// Marks the run as displacement controlled with `step` installed.
    pub fn with_control(mut self, target: ControlTarget, step: f64) -> Self {
        self.control = Some(target);
        self.active_step = Some(step);
        self
    }

    /// Index into the configured algorithm list last applied to the solver.
    pub fn active_algorithm(&self) -> usize {
        self.active_algorithm
    }

    pub fn active_iterations(&self) -> usize {
        self.active_iterations
    }

    pub fn active_tolerance(&self) -> f64 {
        self.active_tolerance
    }

    /// Displacement increment installed on the solver (static runs only).
    pub fn active_step(&self) -> Option<f64> {
        self.active_step
    }

    pub fn control(&self) -> Option<ControlTarget> {
        self.control
    }

    pub fn completed_segments(&self) -> usize {
        self.completed_segments
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments
    }

    /// Completed fraction of the planned segments.
    pub fn progress(&self) -> f64 {
        if self.total_segments == 0 {
            return 1.0;
        }
        self.completed_segments as f64 / self.total_segments as f64
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn stats(&self) -> &RecoveryStats {
        &self.stats
    }

    /// Counts one trial step. Returns `true` when a progress report is due.
    pub(crate) fn record_trial(&mut self, print_every: usize) -> bool {
        self.stats.trial_steps += 1;
        self.trials_since_report += 1;
        if self.trials_since_report >= print_every.max(1) {
            self.trials_since_report = 0;
            return true;
        }
        false
    }

    pub(crate) fn complete_segment(&mut self) {
        self.completed_segments += 1;
    }
}
