//! Error types for the pfem kernel.

use thiserror::Error;

/// Result type alias using [`FemError`].
pub type Result<T> = std::result::Result<T, FemError>;

/// Errors raised while setting up or integrating a finite element problem.
#[derive(Error, Debug)]
pub enum FemError {
    /// Invalid or missing parameters, inconsistent mesh/dof setup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Newton did not meet its tolerances, or a local return mapping failed.
    #[error("convergence error: {0}")]
    Convergence(String),

    /// Singular Jacobian or non-physical state.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Failure reported by an output collaborator.
    #[error("I/O error: {0}")]
    Io(String),

    /// A time step could not be completed and the run was aborted.
    #[error("step {step} failed at t={time:.6e} (dt={dt:.6e}): {source}")]
    StepFailed {
        step: usize,
        time: f64,
        dt: f64,
        #[source]
        source: Box<FemError>,
    },
}

impl FemError {
    /// Prefix the message with the element that produced it, keeping the kind.
    pub fn in_element(self, element_id: usize) -> Self {
        self.prefixed(&format!("element {element_id}"))
    }

    /// Prefix the message with the quadrature point that produced it.
    pub fn at_point(self, qp: usize) -> Self {
        self.prefixed(&format!("quadrature point {qp}"))
    }

    fn prefixed(self, context: &str) -> Self {
        match self {
            FemError::Config(msg) => FemError::Config(format!("{context}: {msg}")),
            FemError::Convergence(msg) => FemError::Convergence(format!("{context}: {msg}")),
            FemError::Numerical(msg) => FemError::Numerical(format!("{context}: {msg}")),
            other => other,
        }
    }

    /// Whether the time stepper may retry the step with a smaller increment.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FemError::Convergence(_))
    }
}

impl From<std::io::Error> for FemError {
    fn from(err: std::io::Error) -> Self {
        FemError::Io(err.to_string())
    }
}
