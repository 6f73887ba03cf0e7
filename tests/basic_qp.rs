use graphqp::algebra::{Matrix, VectorMath};
use graphqp::graph::{JacobianFactor, Key, LinearInequality, VectorValues};
use graphqp::solver::{
    ActiveSetSolver, QuadraticProgram, Settings, SettingsBuilder, SolverError, WorkingSet,
};

fn values(entries: &[(u64, &[f64])]) -> VectorValues {
    entries
        .iter()
        .map(|&(k, v)| (Key(k), v.to_vec()))
        .collect()
}

fn prior(key: u64, target: &[f64]) -> JacobianFactor {
    JacobianFactor::new(
        vec![(Key(key), Matrix::identity(target.len()))],
        target.to_vec(),
    )
}

/// minimize ½‖x − [2,2]‖² subject to x₁ ≤ 1
fn bound_constrained_qp() -> QuadraticProgram {
    QuadraticProgram::new(
        vec![prior(0, &[2.0, 2.0])],
        vec![],
        vec![LinearInequality::new(
            vec![(Key(0), vec![1.0, 0.0])],
            1.0,
            100,
        )],
    )
    .unwrap()
}

#[test]
fn test_qp_bound_constrained() {
    let qp = bound_constrained_qp();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let solution = solver.solve(&values(&[(0, &[0.0, 0.0])])).unwrap();

    assert!(solution.primal.at(Key(0)).dist(&[1.0, 2.0]) <= 1e-9);
    assert!(solution.working_set.is_active(0));
    assert_eq!(solution.iterations, 2);

    // the multiplier balances the unconstrained gradient's first component
    assert!(solution.duals.at(Key(100)).dist(&[-1.0]) <= 1e-9);

    assert!(qp.is_feasible(&solution.primal, 1e-9));
    assert!((qp.objective(&solution.primal) - 0.5).abs() <= 1e-9);
}

#[test]
fn test_qp_two_bounds() {
    // minimize ½‖x − [2,2]‖² subject to x₁ ≤ 1, x₂ ≤ 1
    let qp = QuadraticProgram::new(
        vec![prior(0, &[2.0, 2.0])],
        vec![],
        vec![
            LinearInequality::new(vec![(Key(0), vec![1.0, 0.0])], 1.0, 100),
            LinearInequality::new(vec![(Key(0), vec![0.0, 1.0])], 1.0, 101),
        ],
    )
    .unwrap();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let solution = solver.solve(&values(&[(0, &[0.0, 0.0])])).unwrap();

    assert!(solution.primal.at(Key(0)).dist(&[1.0, 1.0]) <= 1e-9);
    assert_eq!(solution.working_set.num_active(), 2);
    assert!(solution.duals.at(Key(100)).dist(&[-1.0]) <= 1e-9);
    assert!(solution.duals.at(Key(101)).dist(&[-1.0]) <= 1e-9);
}

#[test]
fn test_qp_multiplier_sign_invariant() {
    let qp = bound_constrained_qp();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let solution = solver.solve(&values(&[(0, &[0.0, 0.0])])).unwrap();

    for ix in solution.working_set.active_positions() {
        let dual_key = Key(100 + ix as u64);
        let lambda = solution.duals.get(dual_key).map_or(0.0, |v| v[0]);
        assert!(lambda <= 1e-9);
    }
}

#[test]
fn test_qp_wrongly_active_constraint_leaves() {
    // x₁ ≤ 3 is not binding at the optimum; start with it active anyway
    let qp = QuadraticProgram::new(
        vec![prior(0, &[2.0, 2.0])],
        vec![],
        vec![LinearInequality::new(
            vec![(Key(0), vec![1.0, 0.0])],
            3.0,
            100,
        )],
    )
    .unwrap();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let solution = solver
        .solve_with_working_set(&values(&[(0, &[3.0, 2.0])]), WorkingSet::with_flags(vec![true]))
        .unwrap();

    assert!(solution.primal.at(Key(0)).dist(&[2.0, 2.0]) <= 1e-9);
    assert!(!solution.working_set.is_active(0));
    assert_eq!(solution.iterations, 2);
    // nothing exerts force at the unconstrained optimum
    assert!(solution.duals.is_empty());
}

#[test]
fn test_qp_resolve_is_idempotent() {
    let qp = bound_constrained_qp();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let first = solver.solve(&values(&[(0, &[0.0, 0.0])])).unwrap();
    let second = solver
        .solve_with_working_set(&first.primal, first.working_set.clone())
        .unwrap();

    // converges immediately, with no further activations or deactivations
    assert_eq!(second.iterations, 1);
    assert_eq!(second.working_set, first.working_set);
    assert!(second.primal.dist(&first.primal) <= 1e-12);
}

#[test]
fn test_qp_iteration_limit() {
    let qp = bound_constrained_qp();
    let settings = SettingsBuilder::default().max_iter(1u32).build().unwrap();
    let solver = ActiveSetSolver::new(&qp, settings);

    let result = solver.solve(&values(&[(0, &[0.0, 0.0])]));
    assert!(matches!(result, Err(SolverError::IterationLimitExceeded(1))));
}

#[test]
fn test_qp_missing_initial_value() {
    let qp = bound_constrained_qp();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let result = solver.solve(&values(&[(7, &[0.0, 0.0])]));
    assert!(matches!(result, Err(SolverError::UnknownKey(Key(0)))));
}

#[test]
fn test_qp_degenerate_working_set_is_singular() {
    // the same row twice; activating both makes the subproblem degenerate
    let qp = QuadraticProgram::new(
        vec![prior(0, &[2.0, 2.0])],
        vec![],
        vec![
            LinearInequality::new(vec![(Key(0), vec![1.0, 0.0])], 1.0, 100),
            LinearInequality::new(vec![(Key(0), vec![1.0, 0.0])], 1.0, 101),
        ],
    )
    .unwrap();
    let solver = ActiveSetSolver::new(&qp, Settings::default());

    let result = solver.solve_with_working_set(
        &values(&[(0, &[1.0, 2.0])]),
        WorkingSet::with_flags(vec![true, true]),
    );
    assert!(matches!(result, Err(SolverError::Singular(_))));
}
