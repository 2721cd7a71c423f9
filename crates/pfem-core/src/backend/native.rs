//! Native dense backends built on nalgebra.
//!
//! Both convert the CSR matrix to dense storage, which is adequate for the
//! small-to-medium systems the kernel targets (up to a few thousand dofs).
//! - [`NativeLu`]: partial-pivoting LU, reports singular matrices as errors
//! - [`SvdLeastSquares`]: SVD pseudo-inverse, returns the minimum-norm
//!   least-squares correction for rank-deficient systems

use super::traits::*;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

fn to_dense(matrix: &CsrMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (i, j, v) in matrix.triplet_iter() {
        dense[(i, j)] += *v;
    }
    dense
}

/// Dense LU decomposition
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLu;

impl LinearSolver for NativeLu {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        if matrix.nrows() != rhs.len() || matrix.ncols() != rhs.len() {
            return Err(BackendError::Other(format!(
                "dimension mismatch: {}x{} matrix, rhs of length {}",
                matrix.nrows(),
                matrix.ncols(),
                rhs.len()
            )));
        }
        let x = to_dense(matrix)
            .lu()
            .solve(rhs)
            .ok_or_else(|| BackendError::Singular("zero pivot in LU decomposition".into()))?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(BackendError::Singular(
                "LU solution is not finite".into(),
            ));
        }

        Ok((
            x,
            SolveInfo {
                iterations: 1,
                residual_norm: None,
                solver_name: "nalgebra-LU".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "nalgebra-LU"
    }
}

/// SVD least squares with relative singular value cut-off
#[derive(Debug, Clone, Copy)]
pub struct SvdLeastSquares {
    /// Singular values below `rcond · σ_max` are treated as zero
    pub rcond: f64,
}

impl Default for SvdLeastSquares {
    fn default() -> Self {
        Self { rcond: 1e-12 }
    }
}

impl LinearSolver for SvdLeastSquares {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        if matrix.nrows() != rhs.len() {
            return Err(BackendError::Other(format!(
                "dimension mismatch: {} rows, rhs of length {}",
                matrix.nrows(),
                rhs.len()
            )));
        }
        let dense = to_dense(matrix);
        let svd = dense.clone().svd(true, true);
        let sigma_max = svd.singular_values.max();
        let eps = self.rcond * sigma_max.max(f64::MIN_POSITIVE);
        let x = svd
            .solve(rhs, eps)
            .map_err(|e| BackendError::Other(e.to_string()))?;
        let residual_norm = (&dense * &x - rhs).norm();

        Ok((
            x,
            SolveInfo {
                iterations: 1,
                residual_norm: Some(residual_norm),
                solver_name: "nalgebra-SVD".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "nalgebra-SVD"
    }
}
