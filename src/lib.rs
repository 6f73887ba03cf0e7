//! __graphqp__ is an active-set method for convex quadratic programs whose
//! variables and constraints are expressed as a factor graph rather than a
//! dense matrix.  It solves problems of the form
//!
//! ```text
//! minimize    (1/2)Σ ‖Aᵢ·x − bᵢ‖²      (cost factors)
//! subject to   Cⱼ·x  = dⱼ              (equality factors)
//!              aₖ·x  ≤ bₖ              (inequality factors)
//! ```
//!
//! where each factor touches only a small subset of the variables.  Every
//! variable is an opaque [`Key`](crate::graph::Key) mapped to a fixed-dimension
//! vector, and the solver's bookkeeping (variable indexes, working set, dual
//! system) is graph-structured throughout.
//!
//! The solver alternates between solving the equality-constrained subproblem
//! of the current working set and adjusting which inequality constraints are
//! treated as equalities, until the KKT conditions hold.  Lagrange multipliers
//! are recovered by assembling and solving a dual factor graph.  The
//! linearization producing the factors and the outer nonlinear iteration (SQP,
//! Gauss-Newton) live outside this crate; the equality-constrained and dual
//! subproblems are delegated to a [`LinearSolver`](crate::solver::LinearSolver)
//! backend, with a dense elimination backend bundled.

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod algebra;
pub mod graph;
pub mod solver;
