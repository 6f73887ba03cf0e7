use super::{collect_dual_jacobians, ActiveSetProblem, WorkingSet};
use crate::algebra::{AsFloatT, FloatT, VectorMath};
use crate::graph::{
    Constraint, Factor, FactorGraph, JacobianFactor, Key, KeySet, LinearEquality, LinearInequality,
    VariableIndex, VectorValues,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error type returned by [`QuadraticProgram::new`].  Structural defects are
/// fatal and surfaced at construction, never during iteration.
#[derive(Error, Debug)]
pub enum StructuralError {
    /// Two constraints claim the same multiplier variable.
    #[error("dual key {0} is claimed by more than one constraint")]
    DualKeyCollision(Key),
    /// A key has different dimensions in different factors.
    #[error("key {key} has dimension {expected} in one factor and {found} in another")]
    DimensionMismatch {
        key: Key,
        expected: usize,
        found: usize,
    },
}

/// The constraint associated with a dual key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstraintRef {
    /// position within the equality factors
    Equality(usize),
    /// position within the inequality factors
    Inequality(usize),
}

/// A quadratic program over a factor graph:
///
/// ```text
/// minimize    (1/2)Σ ‖Aᵢ·x − bᵢ‖²      (cost factors)
/// subject to   Cⱼ·x  = dⱼ              (equality factors)
///              aₖ·x  ≤ bₖ              (inequality factors)
/// ```
///
/// All factor content is immutable once constructed; the variable indexes,
/// constrained-key set and the dual-key bijection are built here once and
/// read-only during solving.  Only a solve's private
/// [`WorkingSet`](crate::solver::WorkingSet) mutates between iterations.
#[derive(Debug, Clone)]
pub struct QuadraticProgram<T: FloatT = f64> {
    cost: Vec<JacobianFactor<T>>,
    equalities: Vec<LinearEquality<T>>,
    inequalities: Vec<LinearInequality<T>>,
    // cost + equality factors, shared by every iteration's subproblem
    base_graph: FactorGraph<T>,
    cost_index: VariableIndex,
    equality_index: VariableIndex,
    inequality_index: VariableIndex,
    constrained_keys: KeySet,
    key_dims: BTreeMap<Key, usize>,
    dual_map: BTreeMap<Key, ConstraintRef>,
}

impl<T> QuadraticProgram<T>
where
    T: FloatT,
{
    pub fn new(
        cost: Vec<JacobianFactor<T>>,
        equalities: Vec<LinearEquality<T>>,
        inequalities: Vec<LinearInequality<T>>,
    ) -> Result<Self, StructuralError> {
        let mut key_dims = BTreeMap::new();
        for factor in &cost {
            check_dims(&mut key_dims, factor)?;
        }
        for factor in &equalities {
            check_dims(&mut key_dims, factor)?;
        }
        for factor in &inequalities {
            check_dims(&mut key_dims, factor)?;
        }

        // the dual-key bijection, built once and validated here
        let mut dual_map = BTreeMap::new();
        for (ix, factor) in equalities.iter().enumerate() {
            if dual_map
                .insert(factor.dual_key(), ConstraintRef::Equality(ix))
                .is_some()
            {
                return Err(StructuralError::DualKeyCollision(factor.dual_key()));
            }
        }
        for (ix, factor) in inequalities.iter().enumerate() {
            if dual_map
                .insert(factor.dual_key(), ConstraintRef::Inequality(ix))
                .is_some()
            {
                return Err(StructuralError::DualKeyCollision(factor.dual_key()));
            }
        }

        let constrained_keys: KeySet = equalities
            .iter()
            .flat_map(|f| f.keys().iter().copied())
            .chain(inequalities.iter().flat_map(|f| f.keys().iter().copied()))
            .collect();

        let mut base_graph = FactorGraph::new();
        for factor in &cost {
            base_graph.push(factor.clone());
        }
        for factor in &equalities {
            base_graph.push(factor.clone());
        }

        let cost_index = VariableIndex::build(&cost);
        let equality_index = VariableIndex::build(&equalities);
        let inequality_index = VariableIndex::build(&inequalities);

        Ok(Self {
            cost,
            equalities,
            inequalities,
            base_graph,
            cost_index,
            equality_index,
            inequality_index,
            constrained_keys,
            key_dims,
            dual_map,
        })
    }

    pub fn cost(&self) -> &[JacobianFactor<T>] {
        &self.cost
    }

    pub fn equalities(&self) -> &[LinearEquality<T>] {
        &self.equalities
    }

    /// The constraint owning `dual_key`, if any.
    pub fn constraint_for_dual(&self, dual_key: Key) -> Option<ConstraintRef> {
        self.dual_map.get(&dual_key).copied()
    }

    /// Objective value (1/2)Σ ‖Aᵢ·x − bᵢ‖².
    pub fn objective(&self, x: &VectorValues<T>) -> T {
        let total = self
            .cost
            .iter()
            .fold(T::zero(), |acc, f| acc + f.squared_error(x));
        let half: T = (0.5).as_T();
        half * total
    }

    /// True if `x` satisfies every constraint to tolerance.
    pub fn is_feasible(&self, x: &VectorValues<T>, tol: T) -> bool {
        self.equalities
            .iter()
            .all(|c| c.error_vector(x).norm_inf() <= tol)
            && self
                .inequalities
                .iter()
                .all(|c| c.dot_product_row(x) <= c.bound() + tol)
    }

    /// Gradient of the cost with respect to `key` at `x`; zero for a key no
    /// cost factor touches.
    pub fn cost_gradient(&self, key: Key, x: &VectorValues<T>) -> Vec<T> {
        let dim = self.key_dims.get(&key).copied().unwrap_or(0);
        let mut gradient = vec![T::zero(); dim];
        for &pos in self.cost_index.lookup(key) {
            let term = self.cost[pos]
                .gradient(key, x)
                .expect("variable index out of sync with its factors");
            gradient.axpy(T::one(), &term);
        }
        gradient
    }
}

fn check_dims<T: FloatT>(
    key_dims: &mut BTreeMap<Key, usize>,
    factor: &impl Factor<T>,
) -> Result<(), StructuralError> {
    for &key in factor.keys() {
        let found = factor
            .jacobian(key)
            .map(|block| block.ncols())
            .unwrap_or(0);
        match key_dims.insert(key, found) {
            Some(expected) if expected != found => {
                return Err(StructuralError::DimensionMismatch {
                    key,
                    expected,
                    found,
                })
            }
            _ => {}
        }
    }
    Ok(())
}

impl<T> ActiveSetProblem<T> for QuadraticProgram<T>
where
    T: FloatT,
{
    fn base_graph(&self) -> &FactorGraph<T> {
        &self.base_graph
    }

    fn inequalities(&self) -> &[LinearInequality<T>] {
        &self.inequalities
    }

    fn constrained_keys(&self) -> &KeySet {
        &self.constrained_keys
    }

    fn create_dual_factor(
        &self,
        key: Key,
        working_set: &WorkingSet,
        x: &VectorValues<T>,
    ) -> JacobianFactor<T> {
        // equalities always exert force; inequalities only while active
        let mut terms =
            collect_dual_jacobians(key, &self.equalities, &self.equality_index, |_| true);
        terms.extend(collect_dual_jacobians(
            key,
            &self.inequalities,
            &self.inequality_index,
            |pos| working_set.is_active(pos),
        ));
        JacobianFactor::new(terms, self.cost_gradient(key, x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Matrix;

    fn prior(key: u64, target: &[f64]) -> JacobianFactor {
        JacobianFactor::new(
            vec![(Key(key), Matrix::identity(target.len()))],
            target.to_vec(),
        )
    }

    fn bound_x1(b: f64, dual_key: u64) -> LinearInequality {
        LinearInequality::new(vec![(Key(0), vec![1.0, 0.0])], b, dual_key)
    }

    #[test]
    fn test_dual_key_collision() {
        let result = QuadraticProgram::new(
            vec![prior(0, &[2.0, 2.0])],
            vec![],
            vec![bound_x1(1.0, 100), bound_x1(2.0, 100)],
        );
        assert!(matches!(
            result,
            Err(StructuralError::DualKeyCollision(Key(100)))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = QuadraticProgram::new(
            vec![prior(0, &[2.0, 2.0])],
            vec![],
            vec![LinearInequality::new(vec![(Key(0), vec![1.0])], 1.0, 100)],
        );
        assert!(matches!(
            result,
            Err(StructuralError::DimensionMismatch {
                key: Key(0),
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_dual_bijection() {
        let qp = QuadraticProgram::new(
            vec![prior(0, &[2.0, 2.0])],
            vec![LinearEquality::new(
                vec![(Key(0), Matrix::from_row(vec![1.0, 1.0]))],
                vec![2.0],
                200,
            )],
            vec![bound_x1(1.0, 100)],
        )
        .unwrap();

        assert_eq!(
            qp.constraint_for_dual(Key(200)),
            Some(ConstraintRef::Equality(0))
        );
        assert_eq!(
            qp.constraint_for_dual(Key(100)),
            Some(ConstraintRef::Inequality(0))
        );
        assert!(qp.constraint_for_dual(Key(0)).is_none());
        assert_eq!(qp.constrained_keys(), &KeySet::from([Key(0)]));
    }

    #[test]
    fn test_objective_and_feasibility() {
        let qp = QuadraticProgram::new(
            vec![prior(0, &[2.0, 2.0])],
            vec![],
            vec![bound_x1(1.0, 100)],
        )
        .unwrap();

        let x: VectorValues = [(Key(0), vec![1.0, 2.0])].into_iter().collect();
        assert!((qp.objective(&x) - 0.5).abs() <= 1e-12);
        assert!(qp.is_feasible(&x, 1e-9));

        let y: VectorValues = [(Key(0), vec![2.0, 2.0])].into_iter().collect();
        assert!(!qp.is_feasible(&y, 1e-9));
    }

    #[test]
    fn test_cost_gradient() {
        let qp = QuadraticProgram::new(
            vec![prior(0, &[2.0, 2.0])],
            vec![],
            vec![bound_x1(1.0, 100)],
        )
        .unwrap();

        let x: VectorValues = [(Key(0), vec![1.0, 2.0])].into_iter().collect();
        assert_eq!(qp.cost_gradient(Key(0), &x), vec![-1.0, 0.0]);
    }

    #[test]
    fn test_dual_factor_skips_inactive() {
        let qp = QuadraticProgram::new(
            vec![prior(0, &[2.0, 2.0])],
            vec![],
            vec![bound_x1(1.0, 100)],
        )
        .unwrap();
        let x: VectorValues = [(Key(0), vec![1.0, 2.0])].into_iter().collect();

        // inactive inequality contributes no force
        let inactive = qp.create_dual_factor(Key(0), &WorkingSet::new(1), &x);
        assert!(inactive.is_empty());

        let active = qp.create_dual_factor(Key(0), &WorkingSet::with_flags(vec![true]), &x);
        assert_eq!(active.keys(), &[Key(100)]);
        assert_eq!(active.jacobian(Key(100)).unwrap().size(), (2, 1));
        assert_eq!(active.rhs(), &[-1.0, 0.0]);
    }
}
