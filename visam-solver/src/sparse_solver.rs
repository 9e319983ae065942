//! Sparse Gauss-Newton step via the normal equations.
//!
//! Rows of a whitened linear system `J δ = b` are accumulated as triplets,
//! `JᵀJ δ = Jᵀb` is formed with sprs and factorized with a sparse LDLᵀ.
//! Bundle-adjustment Jacobians are overwhelmingly sparse, so only the
//! non-zero blocks are ever stored.

use nalgebra::DVector;
use sprs::{CsMat, SymmetryCheck, TriMat};
use sprs_ldl::Ldl;
use thiserror::Error;

/// Diagonal entries of `JᵀJ` at or below this carry no information.
const MIN_INFORMATION: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("column {column} has no information (variable is unconstrained)")]
    Underdetermined { column: usize },

    #[error("sparse LDL factorization failed: {0}")]
    Factorization(String),

    #[error("linear solve produced a non-finite step")]
    NonFinite,

    #[error("row references column {column} outside a system of {n_cols} columns")]
    ColumnOutOfRange { column: usize, n_cols: usize },
}

pub type Result<T> = std::result::Result<T, SolveError>;

/// Whitened linear least-squares system built row by row.
#[derive(Debug, Clone)]
pub struct SparseLeastSquares {
    n_cols: usize,
    triplets: Vec<(usize, usize, f64)>,
    rhs: Vec<f64>,
}

impl SparseLeastSquares {
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            triplets: Vec::new(),
            rhs: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rhs.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.triplets.len()
    }

    /// Append one row `Σ a_c δ_c = b`. Exact zeros are not stored.
    pub fn push_row<I>(&mut self, entries: I, b: f64) -> Result<()>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let row = self.rhs.len();
        for (column, value) in entries {
            if column >= self.n_cols {
                return Err(SolveError::ColumnOutOfRange {
                    column,
                    n_cols: self.n_cols,
                });
            }
            if value != 0.0 {
                self.triplets.push((row, column, value));
            }
        }
        self.rhs.push(b);
        Ok(())
    }

    fn jacobian(&self) -> CsMat<f64> {
        let mut tri = TriMat::new((self.rhs.len(), self.n_cols));
        for &(row, col, value) in &self.triplets {
            tri.add_triplet(row, col, value);
        }
        tri.to_csr()
    }

    /// Solve for the least-squares step `δ`.
    pub fn solve(&self) -> Result<DVector<f64>> {
        if self.n_cols == 0 {
            return Ok(DVector::zeros(0));
        }

        let jacobian = self.jacobian();
        let jt: CsMat<f64> = jacobian.clone().transpose_into();
        let jtj: CsMat<f64> = &jt * &jacobian;

        // jt is CSC, so each outer vector is one row of J
        let mut jtb = vec![0.0; self.n_cols];
        for (row, entries) in jt.outer_iterator().enumerate() {
            let b = self.rhs[row];
            for (col, &value) in entries.iter() {
                jtb[col] += value * b;
            }
        }

        let hessian = checked_symmetric(&jtj)?;
        let ldl = Ldl::new()
            .check_symmetry(SymmetryCheck::DontCheckSymmetry)
            .numeric(hessian.view())
            .map_err(|e| SolveError::Factorization(format!("{:?}", e)))?;

        let step: Vec<f64> = ldl.solve(&jtb);
        if step.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::NonFinite);
        }

        log::trace!(
            "solved {}x{} system ({} non-zeros, {} in JᵀJ)",
            self.n_rows(),
            self.n_cols,
            self.nnz(),
            jtj.nnz()
        );
        Ok(DVector::from_vec(step))
    }
}

/// Copy `JᵀJ` into CSC storage, rejecting columns with an empty diagonal.
fn checked_symmetric(jtj: &CsMat<f64>) -> Result<CsMat<f64>> {
    let n = jtj.cols();
    let mut diagonal = vec![0.0; n];
    let mut tri = TriMat::new((n, n));

    for (outer, entries) in jtj.outer_iterator().enumerate() {
        for (inner, &value) in entries.iter() {
            if inner == outer {
                diagonal[outer] += value;
            }
            tri.add_triplet(inner, outer, value);
        }
    }

    if let Some(column) = diagonal.iter().position(|&d| !(d > MIN_INFORMATION)) {
        return Err(SolveError::Underdetermined { column });
    }
    Ok(tri.to_csc())
}
