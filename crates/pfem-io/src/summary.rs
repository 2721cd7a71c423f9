use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use pfem_core::{FeProblem, FemError, RunSummary};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Success,
    Failed,
}

/// Where an aborted run stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: usize,
    pub time: f64,
    pub dt: f64,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_name: String,
    pub status: JobStatus,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub num_nodes: usize,
    pub num_elements: usize,
    pub num_dofs: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

impl JobReport {
    pub fn success(
        job_name: impl Into<String>,
        problem: &FeProblem,
        started: DateTime<Utc>,
        run: RunSummary,
    ) -> Self {
        let message = format!(
            "{} steps, {} cutbacks, final time {:.6e}",
            run.steps, run.cutbacks, run.final_time
        );
        Self::new(job_name.into(), problem, started, JobStatus::Success, message, Some(run), None)
    }

    pub fn failure(
        job_name: impl Into<String>,
        problem: &FeProblem,
        started: DateTime<Utc>,
        error: &FemError,
    ) -> Self {
        let failure = match error {
            FemError::StepFailed {
                step,
                time,
                dt,
                source,
            } => Some(StepFailure {
                step: *step,
                time: *time,
                dt: *dt,
                cause: source.to_string(),
            }),
            _ => None,
        };
        Self::new(
            job_name.into(),
            problem,
            started,
            JobStatus::Failed,
            error.to_string(),
            None,
            failure,
        )
    }

    fn new(
        job_name: String,
        problem: &FeProblem,
        started: DateTime<Utc>,
        status: JobStatus,
        message: String,
        run: Option<RunSummary>,
        failure: Option<StepFailure>,
    ) -> Self {
        let finished = Utc::now();
        let elapsed_seconds = (finished - started).num_microseconds().unwrap_or(0) as f64 * 1e-6;
        Self {
            job_name,
            status,
            started,
            finished,
            elapsed_seconds,
            num_nodes: problem.mesh().num_nodes(),
            num_elements: problem.mesh().elements.len(),
            num_dofs: problem.num_dofs(),
            message,
            run,
            failure,
        }
    }
}

pub fn write_report(path: impl AsRef<Path>, report: &JobReport) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
