use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DVector;
use smart_analyze::planner::plan_protocol;
use smart_analyze::solver::{AnalysisMode, ConvergenceTest, NodeTag, StepStatus};
use smart_analyze::{
    Algorithm, AnalyzeOptions, ExtensionRegistry, RecoveryEngine, SessionState, Solver,
};

/// Solver that converges only for steps at or below `threshold`.
struct Threshold {
    threshold: f64,
}

impl Solver for Threshold {
    fn set_convergence_test(&mut self, _test: &ConvergenceTest) -> smart_analyze::Result<()> {
        Ok(())
    }

    fn set_algorithm(&mut self, _algorithm: &Algorithm) -> smart_analyze::Result<()> {
        Ok(())
    }

    fn set_displacement_control(
        &mut self,
        _node: NodeTag,
        _dof: usize,
        _step: f64,
    ) -> smart_analyze::Result<()> {
        Ok(())
    }

    fn set_analysis_mode(&mut self, _mode: AnalysisMode) -> smart_analyze::Result<()> {
        Ok(())
    }

    fn advance(&mut self, step: f64) -> smart_analyze::Result<StepStatus> {
        Ok(StepStatus::from_code(i32::from(step.abs() > self.threshold)))
    }

    fn last_residual_norms(&self) -> DVector<f64> {
        DVector::from_element(1, 1.0e6)
    }
}

fn planner_benchmark(c: &mut Criterion) {
    let targets: Vec<f64> = (1..=40)
        .map(|cycle| {
            let sign = if cycle % 2 == 0 { -1.0 } else { 1.0 };
            sign * 0.05 * cycle as f64
        })
        .collect();
    c.bench_function("plan_cyclic_protocol", |b| {
        b.iter(|| plan_protocol(black_box(0.001), black_box(&targets)).unwrap())
    });
}

fn recovery_benchmark(c: &mut Criterion) {
    let options = AnalyzeOptions::default()
        .with_algorithms(vec![40, 10, 20])
        .with_bisection(0.5, 1.0e-6);

    c.bench_function("bisect_to_small_steps", |b| {
        b.iter(|| {
            let mut solver = Threshold { threshold: 1.0e-3 };
            let mut extensions = ExtensionRegistry::new();
            let mut state = SessionState::new(&options, 1);
            RecoveryEngine::new(&mut solver, &options, &mut extensions)
                .unwrap()
                .attempt(black_box(0.1), &mut state)
                .unwrap()
        })
    });
}

criterion_group!(benches, planner_benchmark, recovery_benchmark);
criterion_main!(benches);
