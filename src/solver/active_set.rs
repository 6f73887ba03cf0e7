use super::{DenseElimination, LinearSolver, Settings, WorkingSet};
use crate::algebra::{EliminationError, FloatT, Matrix};
use crate::graph::{
    Constraint, Factor, FactorGraph, JacobianFactor, Key, KeySet, LinearInequality, VariableIndex,
    VectorValues,
};
use itertools::Itertools;
use thiserror::Error;

/// Error type returned by [`ActiveSetSolver::solve`].
#[derive(Error, Debug)]
pub enum SolverError {
    /// A factor references a key that has no initial value.
    #[error("a factor references key {0}, which has no initial value")]
    UnknownKey(Key),
    /// The equality-constrained or dual subproblem has no unique solution.
    /// The QP is infeasible or degenerate over the current working set; no
    /// solution is guessed.
    #[error("singular subproblem, the QP is infeasible or degenerate: {0}")]
    Singular(#[from] EliminationError),
    /// The outer iteration cap was reached.  Indicates cycling or a too-low
    /// cap rather than proven infeasibility.
    #[error("iteration limit of {0} exceeded without convergence")]
    IterationLimitExceeded(u32),
}

/// A solved subproblem: the primal optimum over the final working set, the
/// Lagrange multipliers establishing its optimality, and the working set
/// itself.
///
/// Multipliers are keyed by the constraints' dual keys.  A constraint absent
/// from the final dual system (an inactive inequality, or one touching no
/// constrained key) carries an implicit zero multiplier.  At the returned
/// point every active inequality's multiplier is non-positive.
#[derive(Debug, Clone)]
pub struct QpSolution<T = f64> {
    /// primal solution
    pub primal: VectorValues<T>,
    /// multiplier assignment, keyed by dual key
    pub duals: VectorValues<T>,
    /// final working set
    pub working_set: WorkingSet,
    /// number of outer iterations
    pub iterations: u32,
}

/// The problem-family interface consumed by [`ActiveSetSolver`].
///
/// `create_dual_factor` is the one problem-specific extension point; the
/// remaining methods expose the graph structure the generic driver iterates
/// over.  Implemented by [`QuadraticProgram`](crate::solver::QuadraticProgram).
pub trait ActiveSetProblem<T>
where
    T: FloatT,
{
    /// Cost and equality factors, shared by every iteration's subproblem.
    /// Active inequalities are appended per iteration by the driver.
    fn base_graph(&self) -> &FactorGraph<T>;

    /// The inequality constraints, in the positions the working set indexes.
    fn inequalities(&self) -> &[LinearInequality<T>];

    /// Keys participating in at least one constraint.  Each becomes at most
    /// one factor of the dual graph.
    fn constrained_keys(&self) -> &KeySet;

    /// Assemble the dual factor of `key` for the current working set: the
    /// linear equation in the multipliers enforcing stationarity at `x`.
    /// Returns an empty factor when no active factor touches `key`.
    fn create_dual_factor(
        &self,
        key: Key,
        working_set: &WorkingSet,
        x: &VectorValues<T>,
    ) -> JacobianFactor<T>;
}

/// Collect the transposed Jacobian terms of the active constraints touching
/// `key`, each paired with its factor's dual key.  One building block of
/// [`ActiveSetProblem::create_dual_factor`] implementations.
pub fn collect_dual_jacobians<T, C>(
    key: Key,
    factors: &[C],
    index: &VariableIndex,
    mut is_active: impl FnMut(usize) -> bool,
) -> Vec<(Key, Matrix<T>)>
where
    T: FloatT,
    C: Constraint<T>,
{
    let mut terms = Vec::new();
    for &pos in index.lookup(key) {
        if !is_active(pos) {
            continue;
        }
        let factor = &factors[pos];
        let block = factor
            .jacobian(key)
            .expect("variable index out of sync with its factors");
        terms.push((factor.dual_key(), block.transpose()));
    }
    terms
}

/// The active-set driver.
///
/// Iterates between solving the equality-constrained subproblem of the
/// current working set and adjusting which inequality constraints are treated
/// as equalities, until the KKT conditions hold over the final working set.
/// The problem data is never mutated; independent subproblems can run as
/// fully independent solver instances.
pub struct ActiveSetSolver<'a, P, S = DenseElimination> {
    problem: &'a P,
    pub settings: Settings,
    linsolver: S,
}

impl<'a, P> ActiveSetSolver<'a, P, DenseElimination> {
    /// A solver over `problem` using the bundled dense elimination backend.
    pub fn new(problem: &'a P, settings: Settings) -> Self {
        Self {
            problem,
            settings,
            linsolver: DenseElimination,
        }
    }
}

impl<'a, P, S> ActiveSetSolver<'a, P, S> {
    /// A solver over `problem` using a caller-supplied linear solver backend.
    pub fn with_solver(problem: &'a P, settings: Settings, linsolver: S) -> Self {
        Self {
            problem,
            settings,
            linsolver,
        }
    }

    /// Solve starting from an all-inactive working set.
    ///
    /// `initials` must be feasible with respect to the inequality
    /// constraints; equality constraints are restored by the first
    /// subproblem solve.
    pub fn solve<T>(&self, initials: &VectorValues<T>) -> Result<QpSolution<T>, SolverError>
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
        S: LinearSolver<T>,
    {
        let working_set = WorkingSet::new(self.problem.inequalities().len());
        self.solve_with_working_set(initials, working_set)
    }

    /// Solve starting from a caller-supplied working set, e.g. the working
    /// set of a previous solution.  Constraints marked active must be tight
    /// at `initials`.
    pub fn solve_with_working_set<T>(
        &self,
        initials: &VectorValues<T>,
        mut working_set: WorkingSet,
    ) -> Result<QpSolution<T>, SolverError>
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
        S: LinearSolver<T>,
    {
        assert_eq!(working_set.len(), self.problem.inequalities().len());
        self.check_initials(initials)?;

        if self.settings.verbose {
            print_header(self.problem.base_graph().len(), &working_set);
        }

        let mut x = initials.clone();
        for iteration in 1..=self.settings.max_iter {
            // solve the equality-constrained subproblem of the current
            // working set; p points at its optimum
            let optimum = self.linsolver.solve(&self.working_graph(&working_set))?;
            let p = optimum.sub(&x);

            // bound the step to stay feasible
            let (alpha, blocking) = self.compute_step_size(&working_set, &x, &p, T::one());
            if let Some(ix) = blocking {
                x = x.add_scaled(alpha, &p);
                working_set.activate(ix);
                if self.settings.verbose {
                    print_status(iteration, alpha, &working_set, &format!("activate #{}", ix));
                }
                continue;
            }

            // the full step is feasible: move to the working-set optimum and
            // check the multipliers there
            x = x.add_scaled(T::one(), &p);
            let duals = self.linsolver.solve(&self.build_dual_graph(&working_set, &x))?;

            match self.identify_leaving_constraint(&working_set, &duals) {
                Some(ix) => {
                    working_set.deactivate(ix);
                    if self.settings.verbose {
                        print_status(iteration, T::one(), &working_set, &format!("drop #{}", ix));
                    }
                }
                None => {
                    if self.settings.verbose {
                        print_status(iteration, T::one(), &working_set, "optimal");
                        print_footer(&working_set, iteration);
                    }
                    return Ok(QpSolution {
                        primal: x,
                        duals,
                        working_set,
                        iterations: iteration,
                    });
                }
            }
        }

        Err(SolverError::IterationLimitExceeded(self.settings.max_iter))
    }

    /// Compute the largest step `alpha ∈ [0, start_alpha]` along `p` from
    /// `xk` that keeps every inactive inequality satisfied, and the position
    /// of the constraint attaining it.
    ///
    /// Only inactive constraints are examined; active ones hold with equality
    /// by construction.  A row with `aᵀp ≤ 0` cannot become violated along
    /// `p` and is skipped.  `(start_alpha, None)` means the full step is
    /// feasible and nothing need activate.  Ties are broken toward the
    /// earliest position in scan order, a deterministic (if arbitrary)
    /// policy kept for reproducibility.
    pub fn compute_step_size<T>(
        &self,
        working_set: &WorkingSet,
        xk: &VectorValues<T>,
        p: &VectorValues<T>,
        start_alpha: T,
    ) -> (T, Option<usize>)
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
    {
        let mut min_alpha = start_alpha;
        let mut closest = None;
        for (ix, factor) in self.problem.inequalities().iter().enumerate() {
            if working_set.is_active(ix) {
                continue;
            }
            let a_t_p = factor.dot_product_row(p);
            if a_t_p <= T::zero() {
                continue;
            }
            // the step at which this row becomes exactly tight
            let a_t_x = factor.dot_product_row(xk);
            let alpha = (factor.bound() - a_t_x) / a_t_p;
            if alpha < min_alpha {
                min_alpha = alpha;
                closest = Some(ix);
            }
        }
        (min_alpha, closest)
    }

    /// Assemble the dual graph for the current working set at `x`: one
    /// factor per constrained key, omitting keys with no active terms.  Its
    /// solution is the multiplier assignment satisfying stationarity.
    pub fn build_dual_graph<T>(&self, working_set: &WorkingSet, x: &VectorValues<T>) -> FactorGraph<T>
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
    {
        let mut dual_graph = FactorGraph::new();
        for &key in self.problem.constrained_keys() {
            let factor = self.problem.create_dual_factor(key, working_set, x);
            if !factor.is_empty() {
                dual_graph.push(factor);
            }
        }
        dual_graph
    }

    /// Find the active inequality whose multiplier violates the sign
    /// condition the most.
    ///
    /// An inequality `a·x ≤ b` that is correctly active has a non-positive
    /// multiplier: its constraint force pulls the solution back into the
    /// feasible side.  A positive multiplier means the constraint is holding
    /// the solution away from a lower-cost feasible point, so it should
    /// leave the working set.  Returns the position of the active constraint
    /// with the largest positive multiplier (earliest position on ties), or
    /// `None` if every active multiplier is ≤ 0.  At most one constraint
    /// leaves per outer iteration.
    pub fn identify_leaving_constraint<T>(
        &self,
        working_set: &WorkingSet,
        lambdas: &VectorValues<T>,
    ) -> Option<usize>
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
    {
        let mut worst = None;
        let mut max_lambda = T::zero();
        for (ix, factor) in self.problem.inequalities().iter().enumerate() {
            if !working_set.is_active(ix) {
                continue;
            }
            // absent from the dual system means a zero multiplier
            let lambda = lambdas
                .get(factor.dual_key())
                .map(|v| v[0])
                .unwrap_or_else(T::zero);
            if lambda > max_lambda {
                worst = Some(ix);
                max_lambda = lambda;
            }
        }
        worst
    }

    fn working_graph<T>(&self, working_set: &WorkingSet) -> FactorGraph<T>
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
    {
        let mut graph = self.problem.base_graph().clone();
        for ix in working_set.active_positions() {
            graph.push(self.problem.inequalities()[ix].clone());
        }
        graph
    }

    fn check_initials<T>(&self, initials: &VectorValues<T>) -> Result<(), SolverError>
    where
        T: FloatT,
        P: ActiveSetProblem<T>,
    {
        let mut required = self.problem.base_graph().keys();
        for factor in self.problem.inequalities() {
            required.extend(factor.keys().iter().copied());
        }
        for key in required {
            if !initials.contains(key) {
                return Err(SolverError::UnknownKey(key));
            }
        }
        Ok(())
    }
}

fn print_header(base_factors: usize, working_set: &WorkingSet) {
    println!("-------------------------------------------------------------");
    println!("      graphqp v{}  -  active-set QP solver", crate::VERSION);
    println!("-------------------------------------------------------------");
    println!(
        "base graph: {} factors, inequalities: {} ({} active at start)",
        base_factors,
        working_set.len(),
        working_set.num_active(),
    );
    println!("{:>5} {:>10} {:>8}  action", "iter", "alpha", "active");
}

fn print_footer(working_set: &WorkingSet, iterations: u32) {
    println!(
        "terminated after {} iterations, working set [{}]",
        iterations,
        working_set.active_positions().format(", "),
    );
}

fn print_status<T: FloatT>(iteration: u32, alpha: T, working_set: &WorkingSet, action: &str) {
    println!(
        "{:>5} {:>10.4} {:>8}  {}",
        iteration,
        alpha,
        working_set.num_active(),
        action
    );
}
