#![allow(non_snake_case)]
use super::{AsFloatT, FloatT, Matrix};
use thiserror::Error;

/// Error type returned by dense factorization and solve operations.
#[derive(Error, Debug)]
pub enum EliminationError {
    /// Matrix dimension fields are incompatible
    #[error("matrix dimension fields are incompatible")]
    IncompatibleDimension,
    /// The system has no unique solution
    #[error("linear system is singular to working precision")]
    SingularSystem,
}

/// Performs LU factorization with partial pivoting of a square matrix.
///
/// Used on the (generally indefinite) KKT systems assembled by the bundled
/// elimination backend, where a Cholesky factorization would not apply.
#[derive(Debug, Clone)]
pub struct LuFactorisation<T = f64> {
    // combined L (unit diagonal, below) and U (on and above)
    LU: Matrix<T>,
    // row permutation from pivoting
    perm: Vec<usize>,
}

impl<T> LuFactorisation<T>
where
    T: FloatT,
{
    pub fn new(A: Matrix<T>) -> Result<Self, EliminationError> {
        if !A.is_square() {
            return Err(EliminationError::IncompatibleDimension);
        }
        let n = A.nrows();
        let mut LU = A;
        let mut perm: Vec<usize> = (0..n).collect();

        // pivots below this threshold are treated as structural zeros
        let scale = LU.data.iter().fold(T::zero(), |acc, v| acc.max(v.abs()));
        let tol = scale.max(T::one()) * T::epsilon() * (16 * n.max(1)).as_T();

        for k in 0..n {
            // partial pivoting on column k
            let mut p = k;
            let mut pmax = LU[(k, k)].abs();
            for i in (k + 1)..n {
                let v = LU[(i, k)].abs();
                if v > pmax {
                    p = i;
                    pmax = v;
                }
            }
            if pmax <= tol {
                return Err(EliminationError::SingularSystem);
            }
            if p != k {
                for j in 0..n {
                    let tmp = LU[(k, j)];
                    LU[(k, j)] = LU[(p, j)];
                    LU[(p, j)] = tmp;
                }
                perm.swap(k, p);
            }

            let pivot = LU[(k, k)];
            for i in (k + 1)..n {
                let l = LU[(i, k)] / pivot;
                LU[(i, k)] = l;
                for j in (k + 1)..n {
                    let ukj = LU[(k, j)];
                    LU[(i, j)] -= l * ukj;
                }
            }
        }

        Ok(Self { LU, perm })
    }

    /// Solves A·x = b using the LU factors of A, in place (x replaces b).
    pub fn solve(&self, b: &mut [T]) {
        let n = self.LU.nrows();
        assert_eq!(b.len(), n);

        // apply row permutation
        let pb: Vec<T> = self.perm.iter().map(|&p| b[p]).collect();
        b.copy_from_slice(&pb);

        // forward substitution, L has unit diagonal
        for i in 1..n {
            for j in 0..i {
                let lij = self.LU[(i, j)];
                b[i] = b[i] - lij * b[j];
            }
        }
        // back substitution
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                let uij = self.LU[(i, j)];
                b[i] = b[i] - uij * b[j];
            }
            b[i] = b[i] / self.LU[(i, i)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::VectorMath;

    #[test]
    fn test_lu_solve() {
        let A = Matrix::from_rows(&[&[2.0, 1.0, 1.0], &[4.0, -6.0, 0.0], &[-2.0, 7.0, 2.0]]);
        let lu = LuFactorisation::new(A).unwrap();
        let mut b = vec![5.0, -2.0, 9.0];
        lu.solve(&mut b);
        assert!(b.as_slice().dist(&[1.0, 1.0, 2.0]) <= 1e-12);
    }

    #[test]
    fn test_lu_indefinite() {
        // KKT-style saddle point system
        let A = Matrix::from_rows(&[&[1.0, 0.0, 1.0], &[0.0, 1.0, 0.0], &[1.0, 0.0, 0.0]]);
        let lu = LuFactorisation::new(A).unwrap();
        let mut b = vec![2.0, 2.0, 1.0];
        lu.solve(&mut b);
        assert!(b.as_slice().dist(&[1.0, 2.0, 1.0]) <= 1e-12);
    }

    #[test]
    fn test_lu_singular() {
        let A = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(matches!(
            LuFactorisation::new(A),
            Err(EliminationError::SingularSystem)
        ));
    }

    #[test]
    fn test_lu_not_square() {
        let A = Matrix::<f64>::zeros((2, 3));
        assert!(matches!(
            LuFactorisation::new(A),
            Err(EliminationError::IncompatibleDimension)
        ));
    }
}
