use super::{Key, KeySet, VectorValues};
use crate::algebra::{FloatT, Matrix, VectorMath};
use enum_dispatch::*;

/// Common interface of all linear factor kinds.
///
/// A factor contributes one cost block, one equation or one inequality over a
/// small subset of variables.  Factors are immutable once constructed.
#[enum_dispatch]
pub trait Factor<T>
where
    T: FloatT,
{
    /// The keys this factor touches, in construction order.
    fn keys(&self) -> &[Key];

    /// Number of rows.
    fn dim(&self) -> usize;

    /// The Jacobian block of partial derivatives with respect to `key`, or
    /// `None` if the factor does not touch `key`.
    fn jacobian(&self, key: Key) -> Option<&Matrix<T>>;

    /// Right-hand side vector.
    fn rhs(&self) -> &[T];
}

/// Constraint factors additionally carry the identifier of their associated
/// Lagrange multiplier variable.  The dual key is stable for the factor's
/// lifetime.
pub trait Constraint<T>: Factor<T>
where
    T: FloatT,
{
    fn dual_key(&self) -> Key;
}

// ---------------------------------
// cost factor
// ---------------------------------

/// A least-squares cost factor contributing ½‖A·x − b‖² to the objective.
///
/// Also the factor type of the dual graph, where the unknowns are multiplier
/// variables rather than primal ones.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor<T = f64> {
    keys: Vec<Key>,
    blocks: Vec<Matrix<T>>,
    rhs: Vec<T>,
}

impl<T> JacobianFactor<T>
where
    T: FloatT,
{
    /// Build from `(key, block)` terms and a right-hand side.  All blocks
    /// must have `rhs.len()` rows.  A factor with no terms is permitted and
    /// contributes nothing.
    pub fn new(terms: Vec<(Key, Matrix<T>)>, rhs: Vec<T>) -> Self {
        let (keys, blocks): (Vec<Key>, Vec<Matrix<T>>) = terms.into_iter().unzip();
        for block in &blocks {
            assert_eq!(block.nrows(), rhs.len());
        }
        Self { keys, blocks, rhs }
    }

    /// True if the factor touches no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Position of `key` within this factor.
    pub fn find(&self, key: Key) -> Option<usize> {
        self.keys.iter().position(|&k| k == key)
    }

    /// The `(key, block)` terms in construction order.
    pub fn terms(&self) -> impl Iterator<Item = (Key, &Matrix<T>)> {
        self.keys.iter().copied().zip(self.blocks.iter())
    }

    /// r = A·x − b
    pub fn error_vector(&self, x: &VectorValues<T>) -> Vec<T> {
        let mut r: Vec<T> = self.rhs.iter().map(|&b| -b).collect();
        for (key, block) in self.terms() {
            r.axpy(T::one(), &block.mul_vec(x.at(key)));
        }
        r
    }

    /// ‖A·x − b‖²
    pub fn squared_error(&self, x: &VectorValues<T>) -> T {
        self.error_vector(x).sumsq()
    }

    /// Gradient of ½‖A·x − b‖² with respect to `key`, i.e. Aₖᵀ(A·x − b), or
    /// `None` if the factor does not touch `key`.
    pub fn gradient(&self, key: Key, x: &VectorValues<T>) -> Option<Vec<T>> {
        let pos = self.find(key)?;
        Some(self.blocks[pos].t_mul_vec(&self.error_vector(x)))
    }
}

impl<T> Factor<T> for JacobianFactor<T>
where
    T: FloatT,
{
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        self.rhs.len()
    }

    fn jacobian(&self, key: Key) -> Option<&Matrix<T>> {
        self.find(key).map(|pos| &self.blocks[pos])
    }

    fn rhs(&self) -> &[T] {
        &self.rhs
    }
}

// ---------------------------------
// equality factor
// ---------------------------------

/// A hard linear constraint A·x = b.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEquality<T = f64> {
    body: JacobianFactor<T>,
    dual_key: Key,
}

impl<T> LinearEquality<T>
where
    T: FloatT,
{
    pub fn new(terms: Vec<(Key, Matrix<T>)>, rhs: Vec<T>, dual_key: impl Into<Key>) -> Self {
        Self {
            body: JacobianFactor::new(terms, rhs),
            dual_key: dual_key.into(),
        }
    }

    /// r = A·x − b
    pub fn error_vector(&self, x: &VectorValues<T>) -> Vec<T> {
        self.body.error_vector(x)
    }
}

impl<T> Factor<T> for LinearEquality<T>
where
    T: FloatT,
{
    fn keys(&self) -> &[Key] {
        self.body.keys()
    }

    fn dim(&self) -> usize {
        self.body.dim()
    }

    fn jacobian(&self, key: Key) -> Option<&Matrix<T>> {
        self.body.jacobian(key)
    }

    fn rhs(&self) -> &[T] {
        self.body.rhs()
    }
}

impl<T> Constraint<T> for LinearEquality<T>
where
    T: FloatT,
{
    fn dual_key(&self) -> Key {
        self.dual_key
    }
}

// ---------------------------------
// inequality factor
// ---------------------------------

/// A single-row linear constraint a·x ≤ b.
///
/// Whether the constraint is currently treated as an equality is not recorded
/// here: activity flags live in the solver's
/// [`WorkingSet`](crate::solver::WorkingSet), indexed by constraint position,
/// so the factor itself stays immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInequality<T = f64> {
    body: JacobianFactor<T>,
    dual_key: Key,
}

impl<T> LinearInequality<T>
where
    T: FloatT,
{
    /// Build from per-key row segments and a scalar bound.
    pub fn new(terms: Vec<(Key, Vec<T>)>, b: T, dual_key: impl Into<Key>) -> Self {
        let terms = terms
            .into_iter()
            .map(|(key, row)| (key, Matrix::from_row(row)))
            .collect();
        Self {
            body: JacobianFactor::new(terms, vec![b]),
            dual_key: dual_key.into(),
        }
    }

    /// The scalar bound b.
    pub fn bound(&self) -> T {
        self.body.rhs()[0]
    }

    /// a·v for an assignment of every key this row touches.
    pub fn dot_product_row(&self, v: &VectorValues<T>) -> T {
        self.body
            .terms()
            .fold(T::zero(), |acc, (key, block)| acc + block.mul_vec(v.at(key))[0])
    }
}

impl<T> Factor<T> for LinearInequality<T>
where
    T: FloatT,
{
    fn keys(&self) -> &[Key] {
        self.body.keys()
    }

    fn dim(&self) -> usize {
        self.body.dim()
    }

    fn jacobian(&self, key: Key) -> Option<&Matrix<T>> {
        self.body.jacobian(key)
    }

    fn rhs(&self) -> &[T] {
        self.body.rhs()
    }
}

impl<T> Constraint<T> for LinearInequality<T>
where
    T: FloatT,
{
    fn dual_key(&self) -> Key {
        self.dual_key
    }
}

// ---------------------------------
// factor wrapper type and graph
// ---------------------------------

/// Wrapper enum over the supported factor kinds, so mixed graphs can be
/// handed to a [`LinearSolver`](crate::solver::LinearSolver) as one
/// collection.
#[enum_dispatch(Factor<T>)]
#[derive(Debug, Clone)]
pub enum GraphFactor<T>
where
    T: FloatT,
{
    Cost(JacobianFactor<T>),
    Equality(LinearEquality<T>),
    Inequality(LinearInequality<T>),
}

/// An ordered collection of factors.
///
/// Factor positions within a graph are stable and are what the
/// [`VariableIndex`](crate::graph::VariableIndex) records.
#[derive(Debug, Clone, Default)]
pub struct FactorGraph<T>
where
    T: FloatT,
{
    factors: Vec<GraphFactor<T>>,
}

impl<T> FactorGraph<T>
where
    T: FloatT,
{
    pub fn new() -> Self {
        Self {
            factors: Vec::new(),
        }
    }

    pub fn push(&mut self, factor: impl Into<GraphFactor<T>>) {
        self.factors.push(factor.into());
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GraphFactor<T>> {
        self.factors.iter()
    }

    /// All keys touched by any factor.
    pub fn keys(&self) -> KeySet {
        self.factors
            .iter()
            .flat_map(|f| f.keys().iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(entries: &[(u64, &[f64])]) -> VectorValues {
        entries
            .iter()
            .map(|&(k, v)| (Key(k), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_jacobian_factor_error_and_gradient() {
        // ½‖x0 + x1 − [2,2]‖² over two 2-dim keys
        let f = JacobianFactor::new(
            vec![(Key(0), Matrix::identity(2)), (Key(1), Matrix::identity(2))],
            vec![2.0, 2.0],
        );
        let x = values(&[(0, &[1.0, 0.0]), (1, &[0.0, 1.0])]);

        assert_eq!(f.error_vector(&x), vec![-1.0, -1.0]);
        assert_eq!(f.squared_error(&x), 2.0);
        assert_eq!(f.gradient(Key(0), &x).unwrap(), vec![-1.0, -1.0]);
        assert!(f.gradient(Key(9), &x).is_none());
    }

    #[test]
    fn test_empty_factor_permitted() {
        let f = JacobianFactor::<f64>::new(vec![], vec![]);
        assert!(f.is_empty());
        assert_eq!(f.dim(), 0);
    }

    #[test]
    fn test_inequality_row() {
        let c = LinearInequality::new(vec![(Key(0), vec![1.0, 0.0])], 5.0, 100);
        let x = values(&[(0, &[4.0, 7.0])]);
        assert_eq!(c.dot_product_row(&x), 4.0);
        assert_eq!(c.bound(), 5.0);
        assert_eq!(c.dual_key(), Key(100));
        assert_eq!(c.dim(), 1);
    }

    #[test]
    fn test_graph_keys() {
        let mut graph = FactorGraph::new();
        graph.push(JacobianFactor::new(
            vec![(Key(3), Matrix::identity(1))],
            vec![0.0],
        ));
        graph.push(LinearInequality::new(vec![(Key(1), vec![1.0])], 1.0, 10));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.keys(), KeySet::from([Key(1), Key(3)]));
    }
}
