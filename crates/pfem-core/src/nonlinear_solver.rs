//! Newton-Raphson solver for the assembled nonlinear system.
//!
//! Solves `R(U) = 0` with
//!
//! 1. assemble `R` and `J = ∂R/∂U` at the trial vector `Unew`
//! 2. check convergence (any one criterion suffices):
//!    - `‖R‖ < abs_tol`
//!    - `‖R‖ / ‖R₀‖ < rel_tol`
//!    - `‖ΔU‖ < step_tol · ‖Unew‖` (after an update)
//! 3. solve `J ΔU = −R` through a [`LinearSolver`]
//! 4. optionally backtrack on `‖R(Unew + α ΔU)‖`
//! 5. `Unew += α ΔU`
//!
//! The solver only ever writes the trial vector it is handed; the accepted
//! solution and the committed history belong to the caller.

use crate::backend::{BackendError, LinearSolver};
use crate::config::{SolverConfig, SolverType};
use crate::error::{FemError, Result};
use crate::sparse_assembly::GlobalSystem;
use nalgebra::DVector;

/// Something that can assemble its residual (and Jacobian) at a trial vector
pub trait ResidualEvaluator {
    /// Fill the global system at `u`; the Jacobian only when requested.
    fn evaluate(&mut self, u: &DVector<f64>, with_jacobian: bool) -> Result<()>;

    /// The system filled by the last call to [`ResidualEvaluator::evaluate`]
    fn system(&self) -> &GlobalSystem;
}

/// Which criterion ended the iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergedBy {
    AbsoluteResidual,
    RelativeResidual,
    StepSize,
}

/// Why Newton gave up
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    MaxIterations,
    LinearSolver(String),
}

/// Final outcome of a Newton solve
#[derive(Debug, Clone, PartialEq)]
pub enum NewtonStatus {
    Converged(ConvergedBy),
    Failed(FailureReason),
}

/// Newton iteration states
#[derive(Debug, Clone, PartialEq)]
enum NewtonState {
    Evaluate,
    LinearSolve,
    LineSearch(DVector<f64>),
    Update(DVector<f64>),
    Done(NewtonStatus),
}

/// Summary of one Newton solve
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonReport {
    pub status: NewtonStatus,
    /// Number of linear solves / updates performed
    pub iterations: usize,
    /// ‖R‖₂ at every evaluation of the Newton loop
    pub residual_history: Vec<f64>,
    pub final_residual: f64,
}

impl NewtonReport {
    pub fn converged(&self) -> bool {
        matches!(self.status, NewtonStatus::Converged(_))
    }
}

/// Newton-Raphson driver
pub struct NonlinearSolver {
    config: SolverConfig,
    linear: Box<dyn LinearSolver>,
}

impl NonlinearSolver {
    pub fn new(config: SolverConfig, linear: Box<dyn LinearSolver>) -> Self {
        Self { config, linear }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn linear_solver(&self) -> &dyn LinearSolver {
        self.linear.as_ref()
    }

    /// Drive `R(u) = 0` starting from `u`, updating `u` in place.
    ///
    /// Returns `Ok` with a failed status when the iteration limit is hit or
    /// the linear solver does not converge; a singular Jacobian and errors
    /// raised during assembly are returned as `Err`.
    pub fn solve<E: ResidualEvaluator>(
        &self,
        problem: &mut E,
        u: &mut DVector<f64>,
    ) -> Result<NewtonReport> {
        let cfg = &self.config;
        let mut iterations = 0;
        let mut history = Vec::new();
        let mut r0_norm = 0.0;
        let mut r_norm = 0.0;
        let mut state = NewtonState::Evaluate;

        let status = loop {
            state = match state {
                NewtonState::Evaluate => {
                    problem.evaluate(u, true)?;
                    r_norm = problem.system().residual.norm();
                    if iterations == 0 {
                        r0_norm = r_norm;
                    }
                    history.push(r_norm);
                    log::debug!(
                        "newton iter {:3}: |R| = {:.6e}, |R|/|R0| = {:.6e}",
                        iterations,
                        r_norm,
                        if r0_norm > 0.0 { r_norm / r0_norm } else { 0.0 }
                    );

                    if !r_norm.is_finite() {
                        return Err(FemError::Numerical(format!(
                            "residual norm is not finite at iteration {iterations}"
                        )));
                    }
                    if r_norm < cfg.abs_tol {
                        NewtonState::Done(NewtonStatus::Converged(ConvergedBy::AbsoluteResidual))
                    } else if iterations > 0 && r0_norm > 0.0 && r_norm / r0_norm < cfg.rel_tol {
                        NewtonState::Done(NewtonStatus::Converged(ConvergedBy::RelativeResidual))
                    } else if iterations >= cfg.max_iters {
                        NewtonState::Done(NewtonStatus::Failed(FailureReason::MaxIterations))
                    } else {
                        NewtonState::LinearSolve
                    }
                }
                NewtonState::LinearSolve => {
                    let system = problem.system();
                    let rhs = -&system.residual;
                    match self.linear.solve(&system.jacobian, &rhs) {
                        Ok((du, _)) => match cfg.solver_type {
                            SolverType::Newton => NewtonState::Update(du),
                            SolverType::NewtonLineSearch => NewtonState::LineSearch(du),
                        },
                        Err(BackendError::Singular(msg)) => {
                            return Err(FemError::Numerical(format!(
                                "singular Jacobian at newton iteration {iterations}: {msg}"
                            )));
                        }
                        Err(e) => {
                            log::warn!("linear solve failed at iteration {iterations}: {e}");
                            NewtonState::Done(NewtonStatus::Failed(FailureReason::LinearSolver(
                                e.to_string(),
                            )))
                        }
                    }
                }
                NewtonState::LineSearch(du) => {
                    let alpha = self.line_search(problem, u, &du, r_norm)?;
                    NewtonState::Update(du * alpha)
                }
                NewtonState::Update(du) => {
                    *u += &du;
                    iterations += 1;
                    if du.norm() < cfg.step_tol * u.norm() {
                        // residual at the accepted vector
                        problem.evaluate(u, false)?;
                        r_norm = problem.system().residual.norm();
                        history.push(r_norm);
                        NewtonState::Done(NewtonStatus::Converged(ConvergedBy::StepSize))
                    } else {
                        NewtonState::Evaluate
                    }
                }
                NewtonState::Done(status) => break status,
            };
        };

        match &status {
            NewtonStatus::Converged(by) => {
                log::debug!("newton converged ({by:?}) in {iterations} iterations, |R| = {r_norm:.6e}")
            }
            NewtonStatus::Failed(reason) => {
                log::warn!("newton failed ({reason:?}) after {iterations} iterations, |R| = {r_norm:.6e}")
            }
        }

        Ok(NewtonReport {
            status,
            iterations,
            residual_history: history,
            final_residual: r_norm,
        })
    }

    /// Backtracking on the residual norm: halve the step until the residual
    /// decreases. A trial whose evaluation fails counts as no decrease.
    ///
    /// Without a decrease the longest step that evaluated is taken; when no
    /// trial evaluated the last evaluation error is returned.
    fn line_search<E: ResidualEvaluator>(
        &self,
        problem: &mut E,
        u: &DVector<f64>,
        du: &DVector<f64>,
        r_norm: f64,
    ) -> Result<f64> {
        let mut alpha = 1.0;
        let mut fallback = None;
        let mut last_error = None;
        for _ in 0..self.config.max_line_search {
            let trial = u + du * alpha;
            match problem.evaluate(&trial, false) {
                Ok(()) => {
                    let trial_norm = problem.system().residual.norm();
                    if trial_norm.is_finite() && trial_norm < r_norm {
                        return Ok(alpha);
                    }
                    fallback.get_or_insert(alpha);
                }
                Err(e) => {
                    log::debug!("line search: trial step {alpha} failed: {e}");
                    last_error = Some(e);
                }
            }
            alpha *= 0.5;
        }
        match (fallback, last_error) {
            (None, Some(e)) => Err(e),
            (fallback, _) => {
                let alpha = fallback.unwrap_or(1.0);
                log::warn!("line search found no decrease, taking step {alpha}");
                Ok(alpha)
            }
        }
    }
}
