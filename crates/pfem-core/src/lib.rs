//! Nonlinear assembly and implicit time-stepping kernel.
//!
//! Turns a mesh and per-block constitutive laws into a global residual and
//! its Jacobian, drives the residual to zero with Newton, and advances
//! history-dependent material state through an implicit time loop with
//! explicit commit and rollback.
//!
//! Data flows `TimeStepper → NonlinearSolver → Assembler → element kernels →
//! MaterialModel`; local results are scattered back through the [`DofMap`].

pub mod assembly;
pub mod backend;
pub mod boundary_conditions;
pub mod config;
pub mod dof_map;
pub mod elements;
pub mod error;
pub mod materials;
pub mod mesh;
pub mod nonlinear_solver;
pub mod output;
pub mod problem;
pub mod sparse_assembly;
pub mod state;
pub mod time_stepper;

pub use assembly::{Assembler, AssemblyInput, AssemblyOptions, ProjectedFields};
pub use backend::{
    BackendError, LinearSolver, LinearSolverKind, NativeLu, SolveInfo, SvdLeastSquares,
    make_solver,
};
pub use boundary_conditions::{
    BcValue, BoundaryConditions, DirichletBc, EdgeLoad, InitialCondition, NodalLoad, ResolvedBcs,
};
pub use config::{SolverConfig, SolverType, TimeMethod, TimeSteppingConfig};
pub use dof_map::DofMap;
pub use elements::{ComputeMode, ElementBlock, KernelKind, TimeCoefficients};
pub use error::{FemError, Result};
pub use materials::{MaterialKind, MaterialModel, MaterialParams, MaterialSpec, StressState};
pub use mesh::{Element, ElementType, Mesh, Node};
pub use nonlinear_solver::{
    ConvergedBy, FailureReason, NewtonReport, NewtonStatus, NonlinearSolver, ResidualEvaluator,
};
pub use output::{MemoryOutput, NullOutput, OutputChain, OutputFrame, OutputWriter, RecordedFrame};
pub use problem::{FeProblem, Solution, StepEvaluator};
pub use sparse_assembly::GlobalSystem;
pub use state::{HistoryBuffer, HistoryValue, QpState};
pub use time_stepper::{RunSummary, StepRecord, TimeStepper};
