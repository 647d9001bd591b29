//! Tunable parameters of a run, their defaults, and user overrides.

use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::error::{AnalyzeError, Result};
use crate::solver::{ConvergenceTest, TestType};

/// Full configuration of a run. Immutable once the run starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Convergence test kind.
    pub test_type: TestType,
    /// Baseline convergence tolerance.
    pub test_tolerance: f64,
    /// Baseline iteration cap of the convergence test.
    pub test_iterations: usize,
    /// Verbosity flag forwarded to the convergence test.
    pub test_print_flag: i32,
    /// Retry with `enlarged_test_iterations` when the last norm is below `norm_threshold`.
    pub try_add_test_iterations: bool,
    pub norm_threshold: f64,
    pub enlarged_test_iterations: usize,
    /// Loosen the tolerance to `loosened_tolerance` once the step cannot shrink further.
    pub try_loosen_tolerance: bool,
    pub loosened_tolerance: f64,
    /// Walk through `algorithm_codes` on non-convergence.
    pub try_alternate_algorithms: bool,
    /// Catalog codes; the first one is the baseline algorithm.
    pub algorithm_codes: Vec<u32>,
    /// Step length to start from. Derived from the loading program when `None`.
    pub initial_step: Option<f64>,
    /// Fraction of the step kept by the first half of a bisection.
    pub relaxation: f64,
    /// Smallest step length bisection may produce.
    pub min_step: f64,
    /// Number of trial steps between progress reports.
    pub print_every: usize,
    /// Raises per-trial traces from `debug` to `info`.
    pub debug_mode: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            test_type: TestType::EnergyIncr,
            test_tolerance: 1.0e-6,
            test_iterations: 7,
            test_print_flag: 0,
            try_add_test_iterations: false,
            norm_threshold: 1.0e3,
            enlarged_test_iterations: 50,
            try_loosen_tolerance: false,
            loosened_tolerance: 1.0,
            try_alternate_algorithms: false,
            algorithm_codes: vec![40],
            initial_step: None,
            relaxation: 0.5,
            min_step: 1.0e-6,
            print_every: 10,
            debug_mode: false,
        }
    }
}

impl AnalyzeOptions {
    /// Checks the invariants a run relies on and resolves the algorithm list.
    pub fn validate(&self) -> Result<Vec<Algorithm>> {
        if !(self.relaxation > 0.0 && self.relaxation < 1.0) {
            return Err(AnalyzeError::RelaxationOutOfRange {
                value: self.relaxation,
            });
        }
        if !(self.min_step > 0.0) {
            return Err(AnalyzeError::non_positive("min_step", self.min_step));
        }
        if !(self.test_tolerance > 0.0) {
            return Err(AnalyzeError::non_positive(
                "test_tolerance",
                self.test_tolerance,
            ));
        }
        if self.test_iterations == 0 {
            return Err(AnalyzeError::non_positive("test_iterations", 0.0));
        }
        if self.enlarged_test_iterations == 0 {
            return Err(AnalyzeError::non_positive("enlarged_test_iterations", 0.0));
        }
        if !(self.loosened_tolerance > 0.0) {
            return Err(AnalyzeError::non_positive(
                "loosened_tolerance",
                self.loosened_tolerance,
            ));
        }
        if let Some(step) = self.initial_step {
            if !(step > 0.0) {
                return Err(AnalyzeError::non_positive("initial_step", step));
            }
            if !step.is_finite() {
                return Err(AnalyzeError::NonFiniteValue {
                    context: "initial_step",
                    value: step,
                });
            }
        }
        Algorithm::resolve_all(&self.algorithm_codes)
    }

    /// Convergence test a run starts from.
    pub fn baseline_test(&self) -> ConvergenceTest {
        self.test_with(self.test_tolerance, self.test_iterations)
    }

    /// Convergence test with the configured kind and print flag.
    pub fn test_with(&self, tolerance: f64, max_iterations: usize) -> ConvergenceTest {
        ConvergenceTest {
            kind: self.test_type,
            tolerance,
            max_iterations,
            print_flag: self.test_print_flag,
        }
    }

    /// Applies `overrides` on top of these options.
    pub fn merged(mut self, overrides: &OptionOverrides) -> Self {
        overrides.apply_to(&mut self);
        self
    }

    /// Sets the convergence test kind.
    pub fn with_test_type(mut self, test_type: TestType) -> Self {
        self.test_type = test_type;
        self
    }

    /// Sets the baseline tolerance and iteration cap.
    pub fn with_test(mut self, tolerance: f64, iterations: usize) -> Self {
        self.test_tolerance = tolerance;
        self.test_iterations = iterations;
        self
    }

    /// Enables the larger iteration budget for near-converged steps.
    pub fn with_enlarged_iterations(mut self, norm_threshold: f64, iterations: usize) -> Self {
        self.try_add_test_iterations = true;
        self.norm_threshold = norm_threshold;
        self.enlarged_test_iterations = iterations;
        self
    }

    /// Enables tolerance loosening at the minimum step.
    pub fn with_loosened_tolerance(mut self, tolerance: f64) -> Self {
        self.try_loosen_tolerance = true;
        self.loosened_tolerance = tolerance;
        self
    }

    /// Sets the algorithm list and enables escalation when it has more than one entry.
    pub fn with_algorithms(mut self, codes: Vec<u32>) -> Self {
        self.try_alternate_algorithms = codes.len() > 1;
        self.algorithm_codes = codes;
        self
    }

    /// Sets the bisection factor and the smallest admissible step.
    pub fn with_bisection(mut self, relaxation: f64, min_step: f64) -> Self {
        self.relaxation = relaxation;
        self.min_step = min_step;
        self
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = Some(step);
        self
    }

    /// Sets how many trial steps pass between progress reports (at least one).
    pub fn with_print_every(mut self, trials: usize) -> Self {
        self.print_every = trials.max(1);
        self
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }
}

/// Partial configuration supplied by a caller.
///
/// Field names follow [`AnalyzeOptions`]; the control keys of existing
/// loading scripts (`testTol`, `algoTypes`, `printPer`, ...) are accepted as
/// aliases so their override tables deserialize unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionOverrides {
    #[serde(alias = "testType")]
    pub test_type: Option<TestType>,
    #[serde(alias = "testTol")]
    pub test_tolerance: Option<f64>,
    #[serde(alias = "testIterTimes")]
    pub test_iterations: Option<usize>,
    #[serde(alias = "testPrintFlag")]
    pub test_print_flag: Option<i32>,
    #[serde(alias = "tryAddTestTimes")]
    pub try_add_test_iterations: Option<bool>,
    #[serde(alias = "normTol")]
    pub norm_threshold: Option<f64>,
    #[serde(alias = "testIterTimesMore")]
    pub enlarged_test_iterations: Option<usize>,
    #[serde(alias = "tryLooseTestTol")]
    pub try_loosen_tolerance: Option<bool>,
    #[serde(alias = "looseTestTolTo")]
    pub loosened_tolerance: Option<f64>,
    #[serde(alias = "tryAlterAlgoTypes")]
    pub try_alternate_algorithms: Option<bool>,
    #[serde(alias = "algoTypes")]
    pub algorithm_codes: Option<Vec<u32>>,
    #[serde(alias = "initialStep")]
    pub initial_step: Option<f64>,
    pub relaxation: Option<f64>,
    #[serde(alias = "minStep")]
    pub min_step: Option<f64>,
    #[serde(alias = "printPer")]
    pub print_every: Option<usize>,
    #[serde(alias = "debugMode")]
    pub debug_mode: Option<bool>,
}

impl OptionOverrides {
    /// Overwrites every field of `options` that is set here.
    pub fn apply_to(&self, options: &mut AnalyzeOptions) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut options.test_type, &self.test_type);
        set(&mut options.test_tolerance, &self.test_tolerance);
        set(&mut options.test_iterations, &self.test_iterations);
        set(&mut options.test_print_flag, &self.test_print_flag);
        set(
            &mut options.try_add_test_iterations,
            &self.try_add_test_iterations,
        );
        set(&mut options.norm_threshold, &self.norm_threshold);
        set(
            &mut options.enlarged_test_iterations,
            &self.enlarged_test_iterations,
        );
        set(&mut options.try_loosen_tolerance, &self.try_loosen_tolerance);
        set(&mut options.loosened_tolerance, &self.loosened_tolerance);
        set(
            &mut options.try_alternate_algorithms,
            &self.try_alternate_algorithms,
        );
        set(&mut options.algorithm_codes, &self.algorithm_codes);
        if self.initial_step.is_some() {
            options.initial_step = self.initial_step;
        }
        set(&mut options.relaxation, &self.relaxation);
        set(&mut options.min_step, &self.min_step);
        set(&mut options.print_every, &self.print_every);
        set(&mut options.debug_mode, &self.debug_mode);
    }
}
