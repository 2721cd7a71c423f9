//! Output collaborators for pfem runs.
//!
//! - **VTK**: legacy ASCII `.vtk` per output step plus a ParaView `.pvd`
//!   time collection
//! - **Checkpoints**: JSON snapshot of `U`, `V` and the committed history that
//!   a later run can resume from
//! - **Job reports**: JSON run summary stamped with wall-clock times

pub mod error;
mod restart;
mod summary;
pub mod vtk_writer;

pub use error::{IoError, Result};
pub use restart::{
    CHECKPOINT_SCHEMA_VERSION, Checkpoint, CheckpointWriter, load_checkpoint, save_checkpoint,
};
pub use summary::{JobReport, JobStatus, StepFailure, write_report};
pub use vtk_writer::VtkWriter;
