//! Adaptive step control for incremental nonlinear solvers.
//!
//! `smart-analyze` drives an external solver (a finite-element style engine
//! with Newton-family algorithms, a convergence test and load or time
//! stepping) through a loading program and recovers automatically when a step
//! does not converge. It offers tools to
//!
//! - select solution algorithms by catalog code (`algorithm` module),
//! - configure the recovery strategies (`options` module),
//! - cut a loading program into segments (`planner` module),
//! - attempt steps with escalating recovery (`recovery` module), and
//! - run transient or displacement-controlled analyses (`session` module).
//!
//! The crate implements no numerical method itself. It sequences calls to a
//! [`Solver`] implementation and reacts to the reported outcome: more
//! iterations when the residual was close, the next algorithm, step
//! bisection, and as a last resort a looser tolerance at the minimum step.
//!
//! # Quick start
//!
//! ```no_run
//! use nalgebra::DVector;
//! use smart_analyze::solver::{AnalysisMode, ConvergenceTest, NodeTag, StepStatus};
//! use smart_analyze::{Algorithm, AnalysisSession, AnalyzeOptions, Solver};
//!
//! struct Engine;
//!
//! impl Solver for Engine {
//!     fn set_convergence_test(&mut self, _test: &ConvergenceTest) -> smart_analyze::Result<()> {
//!         Ok(())
//!     }
//!     fn set_algorithm(&mut self, _algorithm: &Algorithm) -> smart_analyze::Result<()> {
//!         Ok(())
//!     }
//!     fn set_displacement_control(
//!         &mut self,
//!         _node: NodeTag,
//!         _dof: usize,
//!         _step: f64,
//!     ) -> smart_analyze::Result<()> {
//!         Ok(())
//!     }
//!     fn set_analysis_mode(&mut self, _mode: AnalysisMode) -> smart_analyze::Result<()> {
//!         Ok(())
//!     }
//!     fn advance(&mut self, _step: f64) -> smart_analyze::Result<StepStatus> {
//!         Ok(StepStatus::Converged)
//!     }
//!     fn last_residual_norms(&self) -> DVector<f64> {
//!         DVector::zeros(0)
//!     }
//! }
//!
//! let options = AnalyzeOptions::default()
//!     .with_algorithms(vec![40, 10, 20])
//!     .with_enlarged_iterations(1.0e3, 50);
//! let mut session = AnalysisSession::new(Engine, options);
//!
//! let report = session
//!     .run_static(3, 1, 0.01, &[0.1, -0.1, 0.2, -0.2, 0.0])
//!     .expect("valid configuration");
//! println!("{:?} after {:?}", report.status, report.elapsed);
//! ```

pub mod algorithm;
pub mod error;
pub mod options;
pub mod planner;
pub mod recovery;
pub mod session;
pub mod solver;
pub mod state;

pub use algorithm::{Algorithm, ExtensionRegistry, ExtensionSlot};
pub use error::{AnalyzeError, Result};
pub use options::{AnalyzeOptions, OptionOverrides};
pub use recovery::{RecoveryEngine, RecoveryOutcome, Trial};
pub use session::{run_static, run_transient, AnalysisSession, RunReport, RunStatus};
pub use solver::Solver;
pub use state::{RecoveryStats, SessionState};
