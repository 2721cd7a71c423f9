//! Linear solver backends.
//!
//! # Architecture
//!
//! ```text
//! Element kernels (nalgebra DMatrix, small and dense)
//!         │
//!         ▼
//! GlobalSystem (CSR Jacobian, fixed pattern)
//!         │
//!         ▼
//! LinearSolver trait
//!    ┌────┴─────┐
//!    ▼          ▼
//! NativeLu   SvdLeastSquares
//! ```

pub mod native;
pub mod traits;

pub use native::{NativeLu, SvdLeastSquares};
pub use traits::*;

use serde::{Deserialize, Serialize};

/// Backend selector used in job descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinearSolverKind {
    #[default]
    Lu,
    Svd,
}

/// Instantiate the selected backend
pub fn make_solver(kind: LinearSolverKind) -> Box<dyn LinearSolver> {
    match kind {
        LinearSolverKind::Lu => Box::new(NativeLu),
        LinearSolverKind::Svd => Box::new(SvdLeastSquares::default()),
    }
}
