//! Solver and time-stepping configuration.
//!
//! Plain structs with the historical defaults; every field may be omitted
//! when loading from JSON.

use crate::error::{FemError, Result};
use serde::{Deserialize, Serialize};

/// Newton variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverType {
    /// Full Newton steps
    Newton,
    /// Newton with backtracking on the residual norm
    #[default]
    NewtonLineSearch,
}

/// Nonlinear solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub solver_type: SolverType,
    pub max_iters: usize,
    /// Absolute residual tolerance
    pub abs_tol: f64,
    /// Residual tolerance relative to the first residual of the step
    pub rel_tol: f64,
    /// Step tolerance relative to the trial solution norm
    pub step_tol: f64,
    /// Maximum number of step halvings in the line search
    pub max_line_search: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_type: SolverType::NewtonLineSearch,
            max_iters: 20,
            abs_tol: 2.5e-8,
            rel_tol: 1e-9,
            step_tol: 1e-16,
            max_line_search: 5,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iters == 0 {
            return Err(FemError::Config("max_iters must be at least 1".into()));
        }
        for (name, value) in [
            ("abs_tol", self.abs_tol),
            ("rel_tol", self.rel_tol),
            ("step_tol", self.step_tol),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(FemError::Config(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Time discretization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeMethod {
    #[default]
    BackwardEuler,
    /// Rates are zero; time is a load parameter
    Static,
}

/// Time loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSteppingConfig {
    pub method: TimeMethod,
    /// Initial (fixed-step runs: only) step size
    pub dt0: f64,
    pub end_time: f64,
    /// Write output every `output_interval` steps
    pub output_interval: usize,
    /// Retry failed steps with a smaller increment and grow after easy ones
    pub adaptive: bool,
    pub growth_factor: f64,
    pub cutback_factor: f64,
    pub dt_min: f64,
    pub dt_max: Option<f64>,
    /// Grow the step when Newton needed at most this many iterations
    pub opt_iters: usize,
    /// Project quadrature-point quantities to the nodes for output
    pub project: bool,
}

impl Default for TimeSteppingConfig {
    fn default() -> Self {
        Self {
            method: TimeMethod::BackwardEuler,
            dt0: 1.0,
            end_time: 1.0,
            output_interval: 1,
            adaptive: false,
            growth_factor: 1.2,
            cutback_factor: 0.5,
            dt_min: 1e-12,
            dt_max: None,
            opt_iters: 6,
            project: false,
        }
    }
}

impl TimeSteppingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.dt0.is_finite() && self.dt0 > 0.0) {
            return Err(FemError::Config(format!("dt0 must be positive, got {}", self.dt0)));
        }
        if !(self.end_time.is_finite() && self.end_time >= 0.0) {
            return Err(FemError::Config(format!(
                "end_time must be non-negative, got {}",
                self.end_time
            )));
        }
        if self.output_interval == 0 {
            return Err(FemError::Config("output_interval must be at least 1".into()));
        }
        if self.adaptive {
            if !(self.cutback_factor > 0.0 && self.cutback_factor < 1.0) {
                return Err(FemError::Config(format!(
                    "cutback_factor must lie in (0, 1), got {}",
                    self.cutback_factor
                )));
            }
            if self.growth_factor.is_nan() || self.growth_factor < 1.0 {
                return Err(FemError::Config(format!(
                    "growth_factor must be at least 1, got {}",
                    self.growth_factor
                )));
            }
            if self.dt_min.is_nan() || self.dt_min <= 0.0 || self.dt_min > self.dt0 {
                return Err(FemError::Config(format!(
                    "dt_min must lie in (0, dt0], got {}",
                    self.dt_min
                )));
            }
            if let Some(dt_max) = self.dt_max {
                if dt_max.is_nan() || dt_max < self.dt0 {
                    return Err(FemError::Config(format!(
                        "dt_max must be at least dt0, got {dt_max}"
                    )));
                }
            }
        }
        Ok(())
    }
}
