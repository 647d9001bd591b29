//! Contract of the external nonlinear solver driven by this crate.

use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::error::Result;

/// Identifier of a model node.
pub type NodeTag = i64;

/// Convergence test kinds understood by the solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    NormUnbalance,
    NormDispIncr,
    #[default]
    EnergyIncr,
    RelativeNormUnbalance,
    RelativeNormDispIncr,
    RelativeTotalNormDispIncr,
    RelativeEnergyIncr,
    FixedNumIter,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestType::NormUnbalance => "NormUnbalance",
            TestType::NormDispIncr => "NormDispIncr",
            TestType::EnergyIncr => "EnergyIncr",
            TestType::RelativeNormUnbalance => "RelativeNormUnbalance",
            TestType::RelativeNormDispIncr => "RelativeNormDispIncr",
            TestType::RelativeTotalNormDispIncr => "RelativeTotalNormDispIncr",
            TestType::RelativeEnergyIncr => "RelativeEnergyIncr",
            TestType::FixedNumIter => "FixedNumIter",
        };
        f.write_str(name)
    }
}

/// Stopping criterion applied to each step's nonlinear iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceTest {
    pub kind: TestType,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Solver-specific verbosity flag.
    pub print_flag: i32,
}

impl fmt::Display for ConvergenceTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:e} {} {}",
            self.kind, self.tolerance, self.max_iterations, self.print_flag
        )
    }
}

/// Kind of analysis the solver advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    /// Time history: each step is a time increment.
    Transient,
    /// Displacement control: each step is a displacement increment.
    Static,
}

/// Outcome reported by [`Solver::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Converged,
    /// The solver's own non-zero status code.
    NotConverged(i32),
}

impl StepStatus {
    /// Maps a solver status code, where `0` means converged.
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            StepStatus::Converged
        } else {
            StepStatus::NotConverged(code)
        }
    }

    pub fn is_converged(self) -> bool {
        self == StepStatus::Converged
    }
}

/// Operations the step controller needs from an incremental nonlinear solver.
///
/// Every method is a blocking call on the solver's single mutable state.
/// Ordinary non-convergence is reported through [`StepStatus`]; an `Err`
/// means the solver is unusable and ends the run without recovery.
pub trait Solver {
    /// Replaces the convergence test.
    fn set_convergence_test(&mut self, test: &ConvergenceTest) -> Result<()>;

    /// Replaces the solution algorithm. User slots never reach this method.
    fn set_algorithm(&mut self, algorithm: &Algorithm) -> Result<()>;

    /// Configures displacement control of `dof` at `node` with increment `step`.
    fn set_displacement_control(&mut self, node: NodeTag, dof: usize, step: f64) -> Result<()>;

    fn set_analysis_mode(&mut self, mode: AnalysisMode) -> Result<()>;

    /// Advances one step. `step` is the time increment in transient mode; in
    /// static mode the increment is already installed by displacement control.
    fn advance(&mut self, step: f64) -> Result<StepStatus>;

    /// Residual norms of the last test, most recent last.
    fn last_residual_norms(&self) -> DVector<f64>;
}

impl<S: Solver + ?Sized> Solver for &mut S {
    fn set_convergence_test(&mut self, test: &ConvergenceTest) -> Result<()> {
        (**self).set_convergence_test(test)
    }

    fn set_algorithm(&mut self, algorithm: &Algorithm) -> Result<()> {
        (**self).set_algorithm(algorithm)
    }

    fn set_displacement_control(&mut self, node: NodeTag, dof: usize, step: f64) -> Result<()> {
        (**self).set_displacement_control(node, dof, step)
    }

    fn set_analysis_mode(&mut self, mode: AnalysisMode) -> Result<()> {
        (**self).set_analysis_mode(mode)
    }

    fn advance(&mut self, step: f64) -> Result<StepStatus> {
        (**self).advance(step)
    }

    fn last_residual_norms(&self) -> DVector<f64> {
        (**self).last_residual_norms()
    }
}
