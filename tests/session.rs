mod common;

use common::{Call, ScriptedSolver};
use smart_analyze::algorithm::LineSearch;
use smart_analyze::solver::AnalysisMode;
use smart_analyze::{
    run_static, run_transient, Algorithm, AnalysisSession, AnalyzeError, AnalyzeOptions,
    ExtensionSlot, OptionOverrides, RunStatus,
};

#[test]
fn transient_run_with_converging_solver_takes_every_step_once() {
    let mut solver = ScriptedSolver::always_converging();

    let report = run_transient(&mut solver, 0.01, 3, None).unwrap();

    assert!(report.is_success());
    assert_eq!(report.mode, AnalysisMode::Transient);
    assert_eq!(report.segments_completed, 3);
    assert_eq!(report.segments_total, 3);
    assert_eq!(report.stats.failed_trials, 0);
    assert_eq!(report.stats.bisections, 0);

    let options = AnalyzeOptions::default();
    assert_eq!(
        solver.calls,
        vec![
            Call::Test(options.baseline_test()),
            Call::Algorithm(Algorithm::from_code(40).unwrap()),
            Call::Mode(AnalysisMode::Transient),
            Call::Advance(0.01),
            Call::Advance(0.01),
            Call::Advance(0.01),
        ]
    );
}

#[test]
fn static_run_follows_the_cyclic_protocol() {
    let mut solver = ScriptedSolver::always_converging();

    let report = run_static(&mut solver, 1, 1, 0.5, &[1.0, -1.0], None).unwrap();

    assert!(report.is_success());
    assert_eq!(report.segments_total, 6);
    assert_eq!(solver.advances(), vec![0.5, 0.5, -0.5, -0.5, -0.5, -0.5]);
    let controls: Vec<Call> = solver
        .calls
        .iter()
        .filter(|call| matches!(call, Call::Control { .. }))
        .cloned()
        .collect();
    assert_eq!(
        controls,
        vec![
            Call::Control {
                node: 1,
                dof: 1,
                step: 0.5
            },
            Call::Control {
                node: 1,
                dof: 1,
                step: -0.5
            },
        ]
    );
    assert_eq!(solver.settings.mode, Some(AnalysisMode::Static));
}

#[test]
fn static_initial_step_is_capped_by_the_first_target() {
    let mut solver = ScriptedSolver::always_converging();

    run_static(&mut solver, 4, 2, 0.5, &[0.2], None).unwrap();

    assert!(solver.calls.contains(&Call::Control {
        node: 4,
        dof: 2,
        step: 0.2
    }));
    assert_eq!(solver.advances(), vec![0.2]);
}

/// Every bisected sub-step re-targets the displacement control, and a sub-step
/// of the size already installed does not re-apply it.
#[test]
fn static_bisection_retargets_displacement_control() {
    let mut solver = ScriptedSolver::with_rule(|settings, _| {
        settings.control_step.map_or(false, |step| step.abs() <= 0.25)
    });

    let report = run_static(&mut solver, 2, 1, 0.5, &[0.5, 0.0], None).unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.bisections, 2);
    let control = |step| Call::Control {
        node: 2,
        dof: 1,
        step,
    };
    let mode = solver
        .calls
        .iter()
        .position(|call| *call == Call::Mode(AnalysisMode::Static))
        .unwrap();
    assert_eq!(solver.calls[mode - 1], control(0.5));
    assert_eq!(
        solver.calls[mode + 1..].to_vec(),
        vec![
            Call::Advance(0.5),
            control(0.25),
            Call::Advance(0.25),
            Call::Advance(0.25),
            control(-0.5),
            Call::Advance(-0.5),
            control(-0.25),
            Call::Advance(-0.25),
            Call::Advance(-0.25),
        ]
    );
}

#[test]
fn exhausted_segment_aborts_the_run() {
    let mut solver = ScriptedSolver::with_rule(|settings, _| settings.advances <= 2);
    let options = AnalyzeOptions::default().with_bisection(0.5, 0.004);
    let mut session = AnalysisSession::new(&mut solver, options);

    let report = session.run_transient(0.01, 5).unwrap();
    drop(session);

    assert_eq!(
        report.status,
        RunStatus::Failed {
            segment: 2,
            step: 0.01
        }
    );
    assert!(!report.is_success());
    assert_eq!(report.segments_completed, 2);
    // 0.01 fails, then its 0.005 half fails below 2 * min_step.
    assert_eq!(solver.advances(), vec![0.01, 0.01, 0.01, 0.005]);
}

#[test]
fn configuration_errors_are_reported_before_any_solver_call() {
    let mut solver = ScriptedSolver::always_converging();

    let bad_relaxation = OptionOverrides {
        relaxation: Some(1.5),
        ..OptionOverrides::default()
    };
    let err = run_transient(&mut solver, 0.01, 3, Some(&bad_relaxation)).unwrap_err();
    assert!(matches!(err, AnalyzeError::RelaxationOutOfRange { .. }));

    let unknown_code = OptionOverrides {
        algorithm_codes: Some(vec![40, 99]),
        ..OptionOverrides::default()
    };
    let err = run_static(&mut solver, 1, 1, 0.5, &[1.0], Some(&unknown_code)).unwrap_err();
    assert!(matches!(err, AnalyzeError::UnknownAlgorithm { code: 99 }));

    let err = run_static(&mut solver, 1, 1, 0.5, &[], None).unwrap_err();
    assert!(matches!(err, AnalyzeError::EmptyProtocol));

    let err = run_transient(&mut solver, 0.01, 0, None).unwrap_err();
    assert!(matches!(err, AnalyzeError::ZeroSegments));

    let err = run_transient(&mut solver, -0.01, 3, None).unwrap_err();
    assert!(err.is_configuration());

    let backwards = OptionOverrides {
        initial_step: Some(-0.01),
        ..OptionOverrides::default()
    };
    let err = run_transient(&mut solver, 0.01, 3, Some(&backwards)).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::NonPositiveValue {
            context: "initial_step",
            ..
        }
    ));

    let err = run_static(&mut solver, 1, 1, 0.5, &[1.0, f64::NAN], None).unwrap_err();
    assert!(matches!(err, AnalyzeError::NonFiniteValue { .. }));

    let unregistered = OptionOverrides {
        algorithm_codes: Some(vec![91]),
        ..OptionOverrides::default()
    };
    let err = run_transient(&mut solver, 0.01, 3, Some(&unregistered)).unwrap_err();
    assert!(matches!(
        err,
        AnalyzeError::MissingExtension {
            slot: ExtensionSlot::One
        }
    ));

    assert!(solver.calls.is_empty());
}

#[test]
fn script_overrides_drive_algorithm_escalation() {
    let overrides: OptionOverrides =
        serde_json::from_str(r#"{"algoTypes": [10, 20], "tryAlterAlgoTypes": true, "printPer": 1}"#)
            .unwrap();
    let line_search = Algorithm::NewtonLineSearch(LineSearch::Default);
    let mut solver =
        ScriptedSolver::with_rule(move |settings, _| settings.algorithm == Some(line_search));

    let report = run_transient(&mut solver, 0.02, 2, Some(&overrides)).unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.algorithm_switches, 2);
    assert_eq!(report.stats.trial_steps, 4);
    let algorithms: Vec<u32> = solver
        .calls
        .iter()
        .filter_map(|call| match call {
            Call::Algorithm(algorithm) => algorithm.code(),
            _ => None,
        })
        .collect();
    assert_eq!(algorithms, vec![10, 20, 10, 20]);
}

#[test]
fn user_algorithm_installed_through_session_registry() {
    let options = AnalyzeOptions::default().with_algorithms(vec![92]);
    let mut session = AnalysisSession::new(
        ScriptedSolver::with_rule(|settings, _| settings.extension == Some(2)),
        options,
    );
    session.register_extension(ExtensionSlot::Two, |solver: &mut ScriptedSolver| {
        solver.install_extension(2);
        Ok(())
    });

    let report = session.run_static(9, 3, 0.25, &[0.5]).unwrap();

    assert!(report.is_success());
    let solver = session.into_solver();
    assert_eq!(solver.advances(), vec![0.25, 0.25]);
    assert!(solver.calls.contains(&Call::Extension(2)));
}

#[test]
fn solver_fault_ends_the_run_with_an_error() {
    let mut solver = ScriptedSolver::always_converging().with_fault_at(3);

    let err = run_transient(&mut solver, 0.01, 5, None).unwrap_err();

    assert!(matches!(err, AnalyzeError::SolverFault { .. }));
    assert_eq!(solver.advances().len(), 2);
}
