#![allow(non_snake_case)]
use crate::algebra::{EliminationError, FloatT, LuFactorisation, Matrix, VectorMath};
use crate::graph::{Factor, FactorGraph, GraphFactor, Key, VectorValues};
use std::collections::BTreeMap;

/// The linear solver consumed by the active-set driver.
///
/// Given a graph of linear factors, returns an exact solution per key or
/// signals that the system has no unique one.  Cost factors are least-squares
/// terms; equality and inequality factors present in the graph are hard rows
/// (the driver only ever includes inequalities it currently treats as tight).
/// Implementations must not guess a solution for a singular system.
pub trait LinearSolver<T>
where
    T: FloatT,
{
    fn solve(&self, graph: &FactorGraph<T>) -> Result<VectorValues<T>, EliminationError>;
}

/// Bundled dense elimination backend.
///
/// Assembles the graph into one KKT system
///
/// ```text
/// [ H  Cᵀ ] [x]   [g]        H = Σ AᵢᵀAᵢ,  g = Σ Aᵢᵀbᵢ   (cost factors)
/// [ C  0  ] [ν] = [d]        C·x = d                      (constraint rows)
/// ```
///
/// and solves it by LU with partial pivoting.  A graph of cost factors alone
/// (such as the dual graph) reduces to the normal equations, i.e. its
/// least-squares solution.  Each call is a full, independent solve.
#[derive(Debug, Clone, Default)]
pub struct DenseElimination;

impl<T> LinearSolver<T> for DenseElimination
where
    T: FloatT,
{
    fn solve(&self, graph: &FactorGraph<T>) -> Result<VectorValues<T>, EliminationError> {
        // global column ordering over the graph's keys
        let mut widths: BTreeMap<Key, usize> = BTreeMap::new();
        for factor in graph.iter() {
            for &key in factor.keys() {
                let width = factor.jacobian(key).map(|block| block.ncols()).unwrap_or(0);
                widths.entry(key).or_insert(width);
            }
        }
        let mut offsets: BTreeMap<Key, usize> = BTreeMap::new();
        let mut n = 0;
        for (&key, &width) in &widths {
            offsets.insert(key, n);
            n += width;
        }

        let m: usize = graph
            .iter()
            .map(|factor| match factor {
                GraphFactor::Cost(_) => 0,
                constraint => constraint.dim(),
            })
            .sum();

        if n == 0 {
            // no unknowns; constraint rows over nothing cannot be satisfied
            return if m == 0 {
                Ok(VectorValues::new())
            } else {
                Err(EliminationError::SingularSystem)
            };
        }

        let mut KKT = Matrix::zeros((n + m, n + m));
        let mut rhs = vec![T::zero(); n + m];
        let mut row = n;

        for factor in graph.iter() {
            match factor {
                GraphFactor::Cost(f) => {
                    for (ki, Ai) in f.terms() {
                        let oi = offsets[&ki];
                        rhs[oi..oi + Ai.ncols()].axpy(T::one(), &Ai.t_mul_vec(f.rhs()));
                        for (kj, Aj) in f.terms() {
                            KKT.add_assign_block(oi, offsets[&kj], &Ai.t_mul(Aj));
                        }
                    }
                }
                constraint => {
                    let d = constraint.dim();
                    for &key in constraint.keys() {
                        let A = constraint
                            .jacobian(key)
                            .expect("factor key without a jacobian block");
                        let ok = offsets[&key];
                        KKT.set_block(row, ok, A);
                        KKT.set_block(ok, row, &A.transpose());
                    }
                    rhs[row..row + d].copy_from(constraint.rhs());
                    row += d;
                }
            }
        }

        let lu = LuFactorisation::new(KKT)?;
        lu.solve(&mut rhs);

        Ok(offsets
            .iter()
            .map(|(&key, &off)| (key, rhs[off..off + widths[&key]].to_vec()))
            .collect())
    }
}
