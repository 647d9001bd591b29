//! Step attempts with automatic recovery from non-convergence.
//!
//! A failed trial step escalates through the enabled strategies in a fixed
//! order, cheapest first:
//!
//! 1. retry with the enlarged iteration cap when the last residual norm shows
//!    the step was close to converging;
//! 2. retry with the next configured algorithm;
//! 3. once the step cannot be bisected any further, retry once with the
//!    loosened tolerance, and give up otherwise;
//! 4. bisect the step and attempt both parts in order.
//!
//! Conceptually each strategy is a recursive call; the engine runs them from
//! an explicit work stack so deep bisection never grows the call stack. A
//! single exhausted trial fails the whole search.

use log::Level;

use crate::algorithm::{Algorithm, ExtensionRegistry};
use crate::error::{AnalyzeError, Result};
use crate::options::AnalyzeOptions;
use crate::solver::Solver;
use crate::state::SessionState;

/// Result of resolving one segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The segment and all of its sub-steps converged.
    Converged,
    /// Every enabled strategy was exhausted at the minimum step.
    Failed,
}

impl RecoveryOutcome {
    pub fn is_converged(self) -> bool {
        self == RecoveryOutcome::Converged
    }
}

/// Solver settings for a single trial step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trial {
    /// Time or displacement increment.
    pub step: f64,
    /// Index into the configured algorithm list.
    pub algorithm_index: usize,
    /// Iteration cap of the convergence test.
    pub iterations: usize,
    /// Tolerance of the convergence test.
    pub tolerance: f64,
}

impl Trial {
    /// Trial at the baseline algorithm, iteration cap and tolerance.
    pub fn baseline(step: f64, options: &AnalyzeOptions) -> Self {
        Self {
            step,
            algorithm_index: 0,
            iterations: options.test_iterations,
            tolerance: options.test_tolerance,
        }
    }
}

/// Splits `step` into a leading part of `step * relaxation` and the rest.
///
/// The leading part is clamped to at least `min_step` in magnitude; both parts
/// keep the sign of `step` whenever `|step| >= 2 * min_step`. A `relaxation`
/// outside `(0, 1)`, or a clamp that would not shrink the step, falls back to
/// halving, so the leading part is always strictly smaller than `step`.
pub fn bisect(step: f64, relaxation: f64, min_step: f64) -> (f64, f64) {
    let ratio = if relaxation > 0.0 && relaxation < 1.0 {
        relaxation
    } else {
        0.5
    };
    let mut leading = step * ratio;
    if leading.abs() < min_step {
        leading = min_step.copysign(step);
    }
    if !(leading.abs() < step.abs()) {
        leading = 0.5 * step;
    }
    (leading, step - leading)
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    trial: Trial,
    depth: usize,
}

enum Next {
    Done,
    Retry(Trial),
    Split { leading: f64, rest: f64 },
    Exhausted,
}

/// Installs `algorithm` on the solver, routing user slots through `extensions`.
pub(crate) fn install_algorithm<S: Solver>(
    solver: &mut S,
    extensions: &mut ExtensionRegistry<S>,
    algorithm: &Algorithm,
) -> Result<()> {
    match algorithm.extension_slot() {
        Some(slot) => extensions.invoke(slot, solver),
        None => solver.set_algorithm(algorithm),
    }
}

/// Drives trial steps on a solver and recovers from non-convergence.
pub struct RecoveryEngine<'a, S: Solver> {
    solver: &'a mut S,
    options: &'a AnalyzeOptions,
    algorithms: Vec<Algorithm>,
    extensions: &'a mut ExtensionRegistry<S>,
}

impl<'a, S: Solver> RecoveryEngine<'a, S> {
    /// Validates `options`, resolves its algorithm codes and checks that every
    /// user slot they reference is registered in `extensions`.
    pub fn new(
        solver: &'a mut S,
        options: &'a AnalyzeOptions,
        extensions: &'a mut ExtensionRegistry<S>,
    ) -> Result<Self> {
        let algorithms = options.validate()?;
        extensions.ensure_registered(&algorithms)?;
        Ok(Self {
            solver,
            options,
            algorithms,
            extensions,
        })
    }

    /// Algorithms resolved from the configured codes, in escalation order.
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Attempts `step` starting from the baseline solver settings.
    pub fn attempt(&mut self, step: f64, state: &mut SessionState) -> Result<RecoveryOutcome> {
        self.attempt_trial(Trial::baseline(step, self.options), state)
    }

    /// Attempts `trial`, recovering until it converges or nothing is left to try.
    ///
    /// Solver faults abort immediately and are not retried.
    pub fn attempt_trial(
        &mut self,
        trial: Trial,
        state: &mut SessionState,
    ) -> Result<RecoveryOutcome> {
        if !trial.step.is_finite() {
            return Err(AnalyzeError::NonFiniteValue {
                context: "step",
                value: trial.step,
            });
        }
        if trial.algorithm_index >= self.algorithms.len() {
            return Err(AnalyzeError::AlgorithmIndexOutOfRange {
                index: trial.algorithm_index,
                len: self.algorithms.len(),
            });
        }
        let mut pending = vec![Frame { trial, depth: 0 }];

        while let Some(frame) = pending.pop() {
            match self.run_trial(&frame.trial, frame.depth, state)? {
                Next::Done => {}
                Next::Retry(trial) => pending.push(Frame {
                    trial,
                    depth: frame.depth,
                }),
                Next::Split { leading, rest } => {
                    let depth = frame.depth + 1;
                    state.stats.bisections += 1;
                    state.stats.deepest_bisection = state.stats.deepest_bisection.max(depth);
                    let restart = |step| Trial {
                        step,
                        algorithm_index: 0,
                        ..frame.trial
                    };
                    pending.push(Frame {
                        trial: restart(rest),
                        depth,
                    });
                    pending.push(Frame {
                        trial: restart(leading),
                        depth,
                    });
                }
                Next::Exhausted => return Ok(RecoveryOutcome::Failed),
            }
        }

        Ok(RecoveryOutcome::Converged)
    }

    fn trace_level(&self) -> Level {
        if self.options.debug_mode {
            Level::Info
        } else {
            Level::Debug
        }
    }

    fn run_trial(&mut self, trial: &Trial, depth: usize, state: &mut SessionState) -> Result<Next> {
        log::log!(
            self.trace_level(),
            "trial step={} algorithm_index={} iterations={} tolerance={:e} depth={}",
            trial.step,
            trial.algorithm_index,
            trial.iterations,
            trial.tolerance,
            depth
        );

        self.reconfigure(trial, state)?;

        let status = self.solver.advance(trial.step)?;
        if state.record_trial(self.options.print_every) {
            log::info!(
                "progress {:.1}% ({}/{} segments), {} trial steps, elapsed {:.3?}",
                state.progress() * 100.0,
                state.completed_segments(),
                state.total_segments(),
                state.stats.trial_steps,
                state.elapsed()
            );
        }

        if status.is_converged() {
            return Ok(Next::Done);
        }
        state.stats.failed_trials += 1;
        log::log!(self.trace_level(), "step {} did not converge ({status:?})", trial.step);

        Ok(self.recover(trial, state))
    }

    /// Applies only the settings that differ from what the solver already has.
    fn reconfigure(&mut self, trial: &Trial, state: &mut SessionState) -> Result<()> {
        if trial.algorithm_index != state.active_algorithm {
            let algorithm = *self.algorithms.get(trial.algorithm_index).ok_or(
                AnalyzeError::AlgorithmIndexOutOfRange {
                    index: trial.algorithm_index,
                    len: self.algorithms.len(),
                },
            )?;
            log::info!("setting algorithm to {algorithm}");
            install_algorithm(&mut *self.solver, &mut *self.extensions, &algorithm)?;
            state.active_algorithm = trial.algorithm_index;
        }

        if trial.iterations != state.active_iterations || trial.tolerance != state.active_tolerance
        {
            let test = self.options.test_with(trial.tolerance, trial.iterations);
            log::info!("setting convergence test to {test}");
            self.solver.set_convergence_test(&test)?;
            state.active_iterations = trial.iterations;
            state.active_tolerance = trial.tolerance;
        }

        if let Some(target) = state.control {
            if state.active_step != Some(trial.step) {
                log::info!("setting displacement step to {}", trial.step);
                self.solver
                    .set_displacement_control(target.node, target.dof, trial.step)?;
                state.active_step = Some(trial.step);
            }
        }

        Ok(())
    }

    fn recover(&mut self, trial: &Trial, state: &mut SessionState) -> Next {
        let options = self.options;

        if options.try_add_test_iterations && trial.iterations != options.enlarged_test_iterations
        {
            let norms = self.solver.last_residual_norms();
            match norms.as_slice().last().copied() {
                Some(norm) if norm < options.norm_threshold => {
                    log::info!(
                        "enlarging test iterations to {} (last norm {norm:e})",
                        options.enlarged_test_iterations
                    );
                    state.stats.iteration_enlargements += 1;
                    return Next::Retry(Trial {
                        iterations: options.enlarged_test_iterations,
                        ..*trial
                    });
                }
                Some(norm) => log::info!("not enlarging test iterations for norm {norm:e}"),
                None => log::info!("not enlarging test iterations: no residual norm reported"),
            }
        }

        if options.try_alternate_algorithms && trial.algorithm_index + 1 < self.algorithms.len() {
            state.stats.algorithm_switches += 1;
            return Next::Retry(Trial {
                algorithm_index: trial.algorithm_index + 1,
                ..*trial
            });
        }

        if trial.step.abs() < 2.0 * options.min_step {
            log::info!("step {} is too small to bisect", trial.step);
            if options.try_loosen_tolerance && trial.tolerance != options.loosened_tolerance {
                log::warn!(
                    "loosening test tolerance to {:e}",
                    options.loosened_tolerance
                );
                state.stats.tolerance_loosenings += 1;
                return Next::Retry(Trial {
                    step: trial.step,
                    algorithm_index: 0,
                    iterations: options.test_iterations,
                    tolerance: options.loosened_tolerance,
                });
            }
            return Next::Exhausted;
        }

        let (leading, rest) = bisect(trial.step, options.relaxation, options.min_step);
        log::info!("dividing step {} into {leading} and {rest}", trial.step);
        Next::Split { leading, rest }
    }
}
