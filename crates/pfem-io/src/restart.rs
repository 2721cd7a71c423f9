//! JSON checkpoints of an accepted state: step, time, `U`, `V` and the
//! committed quadrature-point history.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use nalgebra::DVector;
use pfem_core::{FeProblem, OutputFrame, OutputWriter, QpState};
use serde::{Deserialize, Serialize};

use crate::error::{IoError, Result};

pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub step: usize,
    pub time: f64,
    pub created: DateTime<Utc>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub history: Vec<QpState>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Checkpoint {
    /// Snapshot of an output frame
    pub fn from_frame(frame: &OutputFrame) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            step: frame.step,
            time: frame.time,
            created: Utc::now(),
            u: frame.solution.iter().copied().collect(),
            v: frame.rate.iter().copied().collect(),
            history: frame.history.to_vec(),
            metadata: BTreeMap::new(),
        }
    }

    /// Snapshot of the accepted state of `problem`
    pub fn capture(problem: &FeProblem, step: usize, time: f64) -> Self {
        Self::from_frame(&problem.frame(step, time, None))
    }

    /// Load solution and history back into a problem set up from the same job.
    pub fn apply(self, problem: &mut FeProblem) -> pfem_core::Result<()> {
        problem.restore(
            DVector::from_vec(self.u),
            DVector::from_vec(self.v),
            self.history,
        )
    }
}

pub fn save_checkpoint(path: impl AsRef<Path>, checkpoint: &Checkpoint) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(checkpoint)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let bytes = fs::read(path)?;
    let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
    if checkpoint.schema_version != CHECKPOINT_SCHEMA_VERSION {
        return Err(IoError::InvalidData(format!(
            "unsupported checkpoint schema version {}",
            checkpoint.schema_version
        )));
    }
    if checkpoint.u.len() != checkpoint.v.len() {
        return Err(IoError::InvalidData(format!(
            "checkpoint holds {} solution and {} rate values",
            checkpoint.u.len(),
            checkpoint.v.len()
        )));
    }
    Ok(checkpoint)
}

/// Output collaborator that keeps the latest frame as a checkpoint file
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    path: PathBuf,
    metadata: BTreeMap<String, String>,
    last_step: Option<usize>,
}

impl CheckpointWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: BTreeMap::new(),
            last_step: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_step(&self) -> Option<usize> {
        self.last_step
    }
}

impl OutputWriter for CheckpointWriter {
    fn write(&mut self, frame: &OutputFrame) -> pfem_core::Result<()> {
        let mut checkpoint = Checkpoint::from_frame(frame);
        checkpoint.metadata = self.metadata.clone();
        save_checkpoint(&self.path, &checkpoint)?;
        self.last_step = Some(frame.step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfem_core::HistoryValue;

    fn sample() -> Checkpoint {
        let mut qp = QpState::new();
        qp.set_scalar("eqp", 0.25);
        let mut metadata = BTreeMap::new();
        metadata.insert("job".to_string(), "plate".to_string());
        Checkpoint {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            step: 3,
            time: 1.25,
            created: Utc::now(),
            u: vec![0.125, -2.5, 9.75],
            v: vec![0.0, 1.0, 2.0],
            history: vec![qp, QpState::new()],
            metadata,
        }
    }

    #[test]
    fn checkpoint_file_preserves_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("checkpoint.json");
        let checkpoint = sample();
        save_checkpoint(&path, &checkpoint).expect("save should succeed");
        let loaded = load_checkpoint(&path).expect("load should succeed");
        assert_eq!(loaded, checkpoint);
        assert_eq!(
            loaded.history[0].0.get("eqp"),
            Some(&HistoryValue::Scalar(0.25))
        );
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_checkpoint(dir.path().join("missing.json")).expect_err("missing file");
        assert!(matches!(err, IoError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn load_fails_for_invalid_payload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{invalid json").expect("write invalid payload");
        assert!(matches!(load_checkpoint(&path), Err(IoError::Json(_))));
    }

    #[test]
    fn load_rejects_other_schema_versions() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("old.json");
        let mut checkpoint = sample();
        checkpoint.schema_version = 0;
        save_checkpoint(&path, &checkpoint).expect("save");
        assert!(matches!(load_checkpoint(&path), Err(IoError::InvalidData(_))));
    }
}
