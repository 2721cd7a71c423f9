//! Linear solver abstraction.
//!
//! The Newton loop hands the assembled Jacobian (CSR) and right-hand side to
//! a [`LinearSolver`]; element-level computations stay in dense nalgebra
//! matrices.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

/// Failure of a linear solve
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The matrix has no unique solution
    #[error("singular matrix: {0}")]
    Singular(String),

    /// An iterative method stopped before reaching its tolerance
    #[error("linear solver did not converge: {0}")]
    NotConverged(String),

    #[error("{0}")]
    Other(String),
}

/// Solver convergence and diagnostic info.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// Final residual norm ‖A x − b‖ (if computed)
    pub residual_norm: Option<f64>,
    /// Human-readable solver name (e.g., "nalgebra-LU")
    pub solver_name: String,
}

/// Trait for a linear solver backend.
///
/// Implementations solve `A x = b`. They must not panic on singular input.
pub trait LinearSolver: Send + Sync {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}
