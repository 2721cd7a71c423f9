//! Implicit time loop.
//!
//! ```text
//! INIT → STEPPING → STEP_SUCCESS → STEPPING → … → DONE
//!                 ↘ STEP_FAILED → STEPPING (adaptive cutback)
//!                               → DONE (fatal)
//! ```
//!
//! A step is either committed completely (`U`, `V` and the history) or not at
//! all. Without adaptive stepping the first failed step aborts the run.

use crate::config::{TimeMethod, TimeSteppingConfig};
use crate::elements::TimeCoefficients;
use crate::error::{FemError, Result};
use crate::nonlinear_solver::{NewtonReport, NewtonStatus, NonlinearSolver};
use crate::output::OutputWriter;
use crate::problem::FeProblem;
use serde::Serialize;

/// One accepted step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub time: f64,
    pub dt: f64,
    pub newton_iterations: usize,
    pub final_residual: f64,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Accepted steps
    pub steps: usize,
    /// Failed attempts that were retried with a smaller increment
    pub cutbacks: usize,
    pub final_time: f64,
    /// Newton iterations over all attempts, failed ones included
    pub total_newton_iterations: usize,
    /// Frames handed to the output collaborator, step 0 included
    pub outputs_written: usize,
    pub history: Vec<StepRecord>,
}

#[derive(Debug)]
enum StepperState {
    Init,
    Stepping,
    StepSuccess { report: NewtonReport, time: f64, dt: f64 },
    StepFailed { error: FemError, time: f64, dt: f64 },
    Done,
}

/// Drives an [`FeProblem`] from t = 0 to the end time
pub struct TimeStepper {
    config: TimeSteppingConfig,
    solver: NonlinearSolver,
}

impl TimeStepper {
    pub fn new(config: TimeSteppingConfig, solver: NonlinearSolver) -> Result<Self> {
        config.validate()?;
        solver.config().validate()?;
        Ok(Self { config, solver })
    }

    pub fn config(&self) -> &TimeSteppingConfig {
        &self.config
    }

    pub fn solver(&self) -> &NonlinearSolver {
        &self.solver
    }

    fn coefficients(&self, dt: f64) -> TimeCoefficients {
        match self.config.method {
            TimeMethod::BackwardEuler => TimeCoefficients::backward_euler(dt),
            TimeMethod::Static => TimeCoefficients::quasi_static(),
        }
    }

    /// Integrate `problem` over `[0, end_time]`.
    ///
    /// Returns [`FemError::StepFailed`] with the step diagnostics when a step
    /// cannot be completed; the problem then still holds the last accepted
    /// solution and history.
    pub fn run(&self, problem: &mut FeProblem, output: &mut dyn OutputWriter) -> Result<RunSummary> {
        self.drive(problem, output, None)
    }

    /// Continue a run whose solution and history were restored from a
    /// checkpoint taken after `step` accepted steps at `time`.
    ///
    /// No step-0 frame is written; step numbering and the summary's step
    /// count carry on from `step`.
    pub fn resume(
        &self,
        problem: &mut FeProblem,
        output: &mut dyn OutputWriter,
        step: usize,
        time: f64,
    ) -> Result<RunSummary> {
        if time < 0.0 || time > self.config.end_time {
            return Err(FemError::Config(format!(
                "restart time {time} outside [0, {}]",
                self.config.end_time
            )));
        }
        self.drive(problem, output, Some((step, time)))
    }

    fn drive(
        &self,
        problem: &mut FeProblem,
        output: &mut dyn OutputWriter,
        start: Option<(usize, f64)>,
    ) -> Result<RunSummary> {
        let cfg = &self.config;
        let mut summary = RunSummary::default();
        let mut time = 0.0;
        let mut dt = cfg.dt0;
        let mut state = StepperState::Init;

        loop {
            state = match state {
                StepperState::Init => {
                    log::info!(
                        "time stepping: {:?}, dt0 = {:.6e}, end time = {:.6e}{}",
                        cfg.method,
                        cfg.dt0,
                        cfg.end_time,
                        if cfg.adaptive { " (adaptive)" } else { "" }
                    );
                    match start {
                        None => {
                            problem.initialize()?;
                            self.write_output(problem, output, 0, time, &mut summary)?;
                        }
                        Some((step, t)) => {
                            log::info!("resuming after step {step} at t = {t:.6e}");
                            summary.steps = step;
                            time = t;
                        }
                    }
                    StepperState::Stepping
                }
                StepperState::Stepping => match self.next_increment(summary.steps, time, dt) {
                    None => StepperState::Done,
                    Some((t_next, dt_step)) => {
                        let coeffs = self.coefficients(dt_step);
                        problem.prepare_step(t_next);
                        log::debug!(
                            "step {}: t = {:.6e}, dt = {:.6e}",
                            summary.steps + 1,
                            t_next,
                            dt_step
                        );
                        match problem.solve_step(&self.solver, t_next, coeffs) {
                            Ok(report) if report.converged() => StepperState::StepSuccess {
                                report,
                                time: t_next,
                                dt: dt_step,
                            },
                            Ok(report) => {
                                summary.total_newton_iterations += report.iterations;
                                StepperState::StepFailed {
                                    error: newton_failure(&report),
                                    time: t_next,
                                    dt: dt_step,
                                }
                            }
                            Err(error) => StepperState::StepFailed {
                                error,
                                time: t_next,
                                dt: dt_step,
                            },
                        }
                    }
                },
                StepperState::StepSuccess {
                    report,
                    time: t_new,
                    dt: dt_step,
                } => {
                    problem.accept_step(dt_step, self.coefficients(dt_step))?;
                    time = t_new;
                    summary.steps += 1;
                    summary.total_newton_iterations += report.iterations;
                    summary.history.push(StepRecord {
                        step: summary.steps,
                        time,
                        dt: dt_step,
                        newton_iterations: report.iterations,
                        final_residual: report.final_residual,
                    });
                    log::info!(
                        "step {} converged: t = {:.6e}, dt = {:.6e}, {} newton iterations, |R| = {:.3e}",
                        summary.steps,
                        time,
                        dt_step,
                        report.iterations,
                        report.final_residual
                    );

                    if summary.steps % cfg.output_interval == 0 {
                        self.write_output(problem, output, summary.steps, time, &mut summary)?;
                    }
                    if cfg.adaptive && report.iterations <= cfg.opt_iters {
                        dt = (dt * cfg.growth_factor).min(cfg.dt_max.unwrap_or(f64::INFINITY));
                    }
                    StepperState::Stepping
                }
                StepperState::StepFailed {
                    error,
                    time: t_fail,
                    dt: dt_step,
                } => {
                    problem.reject_step();
                    let retry = cfg.adaptive && error.is_recoverable();
                    let reduced = dt_step * cfg.cutback_factor;
                    if retry && reduced >= cfg.dt_min {
                        log::warn!(
                            "step {} failed at t = {:.6e} ({}), cutting dt {:.6e} -> {:.6e}",
                            summary.steps + 1,
                            t_fail,
                            error,
                            dt_step,
                            reduced
                        );
                        summary.cutbacks += 1;
                        dt = reduced;
                        StepperState::Stepping
                    } else {
                        if retry {
                            log::warn!("dt {reduced:.6e} would fall below dt_min {:.6e}", cfg.dt_min);
                        }
                        return Err(FemError::StepFailed {
                            step: summary.steps + 1,
                            time: t_fail,
                            dt: dt_step,
                            source: Box::new(error),
                        });
                    }
                }
                StepperState::Done => break,
            };
        }

        summary.final_time = time;
        output.finish()?;
        log::info!(
            "run complete: {} steps, {} cutbacks, t = {:.6e}, {} newton iterations",
            summary.steps,
            summary.cutbacks,
            summary.final_time,
            summary.total_newton_iterations
        );
        Ok(summary)
    }

    /// End time and size of the next step, `None` once the run is complete.
    ///
    /// Fixed stepping takes `floor(end_time / dt0)` steps of exactly `dt0`;
    /// adaptive stepping clips the last step to land on the end time.
    fn next_increment(&self, steps: usize, time: f64, dt: f64) -> Option<(f64, f64)> {
        let cfg = &self.config;
        if cfg.adaptive {
            let remaining = cfg.end_time - time;
            if remaining <= 1e-10 * dt {
                return None;
            }
            if dt >= remaining - 1e-10 * dt {
                Some((cfg.end_time, remaining))
            } else {
                Some((time + dt, dt))
            }
        } else {
            let t_next = (steps + 1) as f64 * cfg.dt0;
            if t_next > cfg.end_time + 1e-10 * cfg.dt0 {
                None
            } else {
                Some((t_next, cfg.dt0))
            }
        }
    }

    fn write_output(
        &self,
        problem: &FeProblem,
        output: &mut dyn OutputWriter,
        step: usize,
        time: f64,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let projected = if self.config.project {
            Some(problem.project()?)
        } else {
            None
        };
        output.write(&problem.frame(step, time, projected.as_ref()))?;
        summary.outputs_written += 1;
        Ok(())
    }
}

fn newton_failure(report: &NewtonReport) -> FemError {
    let reason = match &report.status {
        NewtonStatus::Failed(reason) => format!("{reason:?}"),
        NewtonStatus::Converged(_) => "converged".to_string(),
    };
    FemError::Convergence(format!(
        "newton failed ({reason}) after {} iterations, |R| = {:.3e}",
        report.iterations, report.final_residual
    ))
}
