//! Output collaborator interface.
//!
//! The time stepper hands one [`OutputFrame`] to an [`OutputWriter`] at step 0
//! and then every configured interval. Writers live outside the kernel; the
//! in-memory [`MemoryOutput`] is used by tests and by drivers that post-process
//! results themselves.

use crate::assembly::ProjectedFields;
use crate::dof_map::DofMap;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::state::QpState;
use nalgebra::DVector;

/// Everything a writer may need for one output step
#[derive(Debug, Clone, Copy)]
pub struct OutputFrame<'a> {
    pub step: usize,
    pub time: f64,
    pub mesh: &'a Mesh,
    pub dof_map: &'a DofMap,
    /// Accepted solution `U`
    pub solution: &'a DVector<f64>,
    /// Rate vector `V`
    pub rate: &'a DVector<f64>,
    pub projected: Option<&'a ProjectedFields>,
    /// Committed quadrature-point history, in assembly order
    pub history: &'a [QpState],
}

impl OutputFrame<'_> {
    /// Values of `field` per node; zero where the field is not active.
    pub fn nodal_values(&self, field: &str) -> Vec<f64> {
        (0..self.dof_map.num_nodes())
            .map(|node| {
                self.dof_map
                    .dof(node, field)
                    .map_or(0.0, |dof| self.solution[dof])
            })
            .collect()
    }
}

/// Sink for solution snapshots
pub trait OutputWriter {
    fn write(&mut self, frame: &OutputFrame) -> Result<()>;

    /// Called once after the last step of a successful run
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Discards every frame
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl OutputWriter for NullOutput {
    fn write(&mut self, _frame: &OutputFrame) -> Result<()> {
        Ok(())
    }
}

/// Owned copy of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub step: usize,
    pub time: f64,
    pub solution: DVector<f64>,
    pub projected: Option<ProjectedFields>,
}

/// Keeps every frame in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    pub frames: Vec<RecordedFrame>,
    pub finished: bool,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }
}

impl OutputWriter for MemoryOutput {
    fn write(&mut self, frame: &OutputFrame) -> Result<()> {
        self.frames.push(RecordedFrame {
            step: frame.step,
            time: frame.time,
            solution: frame.solution.clone(),
            projected: frame.projected.cloned(),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Writes frames to several writers in turn
#[derive(Default)]
pub struct OutputChain {
    writers: Vec<Box<dyn OutputWriter>>,
}

impl OutputChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, writer: Box<dyn OutputWriter>) {
        self.writers.push(writer);
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl OutputWriter for OutputChain {
    fn write(&mut self, frame: &OutputFrame) -> Result<()> {
        for writer in &mut self.writers {
            writer.write(frame)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for writer in &mut self.writers {
            writer.finish()?;
        }
        Ok(())
    }
}
