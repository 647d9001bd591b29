//! Scripted solver used by the integration tests.

#![allow(dead_code)]

use nalgebra::DVector;
use smart_analyze::solver::{AnalysisMode, ConvergenceTest, NodeTag, StepStatus};
use smart_analyze::{Algorithm, AnalyzeError, Solver};

/// Every call the step controller made, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Test(ConvergenceTest),
    Algorithm(Algorithm),
    Extension(u8),
    Control { node: NodeTag, dof: usize, step: f64 },
    Mode(AnalysisMode),
    Advance(f64),
}

/// What the solver currently has installed.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub algorithm: Option<Algorithm>,
    pub extension: Option<u8>,
    pub test: Option<ConvergenceTest>,
    pub control_step: Option<f64>,
    pub mode: Option<AnalysisMode>,
    /// Number of advances so far, including the current one.
    pub advances: usize,
}

type Rule = Box<dyn FnMut(&Settings, f64) -> bool>;

pub struct ScriptedSolver {
    pub calls: Vec<Call>,
    pub settings: Settings,
    pub norm: f64,
    converges: Rule,
    fault_at: Option<usize>,
}

impl ScriptedSolver {
    /// Converges whenever `rule(settings, step)` holds.
    pub fn with_rule<F>(rule: F) -> Self
    where
        F: FnMut(&Settings, f64) -> bool + 'static,
    {
        Self {
            calls: Vec::new(),
            settings: Settings::default(),
            norm: 1.0,
            converges: Box::new(rule),
            fault_at: None,
        }
    }

    pub fn always_converging() -> Self {
        Self::with_rule(|_, _| true)
    }

    pub fn never_converging() -> Self {
        Self::with_rule(|_, _| false)
    }

    /// Reports `norm` as the last residual norm of every failed step.
    pub fn with_norm(mut self, norm: f64) -> Self {
        self.norm = norm;
        self
    }

    /// Raises a solver fault on the `advance`-th call (1-based).
    pub fn with_fault_at(mut self, advance: usize) -> Self {
        self.fault_at = Some(advance);
        self
    }

    pub fn advances(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Advance(step) => Some(*step),
                _ => None,
            })
            .collect()
    }

    /// Calls that changed algorithm, test or displacement control.
    pub fn reconfigurations(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Test(_) | Call::Algorithm(_) | Call::Extension(_) | Call::Control { .. }
                )
            })
            .cloned()
            .collect()
    }

    /// Installs the user algorithm for `slot`.
    pub fn install_extension(&mut self, slot: u8) {
        self.settings.algorithm = None;
        self.settings.extension = Some(slot);
        self.calls.push(Call::Extension(slot));
    }
}

impl Solver for ScriptedSolver {
    fn set_convergence_test(&mut self, test: &ConvergenceTest) -> smart_analyze::Result<()> {
        self.settings.test = Some(*test);
        self.calls.push(Call::Test(*test));
        Ok(())
    }

    fn set_algorithm(&mut self, algorithm: &Algorithm) -> smart_analyze::Result<()> {
        self.settings.algorithm = Some(*algorithm);
        self.settings.extension = None;
        self.calls.push(Call::Algorithm(*algorithm));
        Ok(())
    }

    fn set_displacement_control(
        &mut self,
        node: NodeTag,
        dof: usize,
        step: f64,
    ) -> smart_analyze::Result<()> {
        self.settings.control_step = Some(step);
        self.calls.push(Call::Control { node, dof, step });
        Ok(())
    }

    fn set_analysis_mode(&mut self, mode: AnalysisMode) -> smart_analyze::Result<()> {
        self.settings.mode = Some(mode);
        self.calls.push(Call::Mode(mode));
        Ok(())
    }

    fn advance(&mut self, step: f64) -> smart_analyze::Result<StepStatus> {
        self.settings.advances += 1;
        if self.fault_at == Some(self.settings.advances) {
            return Err(AnalyzeError::solver_fault("advance", "singular stiffness"));
        }
        self.calls.push(Call::Advance(step));
        let converged = (self.converges)(&self.settings, step);
        Ok(StepStatus::from_code(if converged { 0 } else { -3 }))
    }

    fn last_residual_norms(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.norm * 10.0, self.norm])
    }
}
