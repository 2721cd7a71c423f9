//! A discretized problem: mesh, blocks, dof numbering, conditions, the global
//! system and the solution vectors.
//!
//! [`FeProblem`] is what the time stepper drives. Its solution is kept as
//! `U` (accepted), `Unew` (Newton trial) and `V` (rate); `U` and the committed
//! history change together in [`FeProblem::accept_step`] and nowhere else.

use crate::assembly::{Assembler, AssemblyInput, AssemblyOptions, ProjectedFields};
use crate::boundary_conditions::{BoundaryConditions, ResolvedBcs};
use crate::dof_map::DofMap;
use crate::elements::{ComputeMode, ElementBlock, TimeCoefficients};
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use crate::nonlinear_solver::{NewtonReport, NonlinearSolver, ResidualEvaluator};
use crate::output::OutputFrame;
use crate::sparse_assembly::GlobalSystem;
use crate::state::QpState;
use nalgebra::DVector;

/// Global solution vectors
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Accepted solution
    pub u: DVector<f64>,
    /// Newton trial vector
    pub u_new: DVector<f64>,
    /// Rate of the last accepted step
    pub v: DVector<f64>,
}

impl Solution {
    fn zeros(n: usize) -> Self {
        Self {
            u: DVector::zeros(n),
            u_new: DVector::zeros(n),
            v: DVector::zeros(n),
        }
    }
}

/// Residual evaluator of one time step, as seen by Newton
pub struct StepEvaluator<'a> {
    assembler: &'a mut Assembler,
    system: &'a mut GlobalSystem,
    bcs: &'a ResolvedBcs,
    u_old: &'a DVector<f64>,
    coeffs: TimeCoefficients,
    time: f64,
}

impl ResidualEvaluator for StepEvaluator<'_> {
    fn evaluate(&mut self, u: &DVector<f64>, with_jacobian: bool) -> Result<()> {
        let mode = if with_jacobian {
            ComputeMode::ResidualJacobian
        } else {
            ComputeMode::Residual
        };
        let input = AssemblyInput {
            u,
            u_old: self.u_old,
            coeffs: self.coeffs,
        };
        self.assembler
            .assemble(&mut *self.system, mode, &input, self.bcs, self.time)
    }

    fn system(&self) -> &GlobalSystem {
        &*self.system
    }
}

/// Fully set-up finite element problem
pub struct FeProblem {
    mesh: Mesh,
    dof_map: DofMap,
    assembler: Assembler,
    bcs: BoundaryConditions,
    resolved: ResolvedBcs,
    system: GlobalSystem,
    solution: Solution,
}

impl FeProblem {
    /// Number the dofs, build the sparsity pattern and resolve the conditions.
    pub fn new(
        mesh: Mesh,
        blocks: Vec<ElementBlock>,
        bcs: BoundaryConditions,
        options: AssemblyOptions,
    ) -> Result<Self> {
        mesh.validate()?;
        let dof_map = DofMap::build(&mesh, &blocks)?;
        let assembler = Assembler::new(&mesh, blocks, &dof_map, options)?;
        let resolved = bcs.resolve(&mesh, &dof_map)?;
        let system = GlobalSystem::new(&mesh, &dof_map)?;

        log::info!(
            "problem: {} nodes, {} elements, {} dofs ({:?}), {} non-zeros",
            mesh.num_nodes(),
            mesh.elements.len(),
            dof_map.total_dofs(),
            dof_map.field_names(),
            system.nnz()
        );

        let solution = Solution::zeros(dof_map.total_dofs());
        Ok(Self {
            mesh,
            dof_map,
            assembler,
            bcs,
            resolved,
            system,
            solution,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    pub fn boundary_conditions(&self) -> &ResolvedBcs {
        &self.resolved
    }

    pub fn system(&self) -> &GlobalSystem {
        &self.system
    }

    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    pub fn num_dofs(&self) -> usize {
        self.dof_map.total_dofs()
    }

    /// Apply the initial and boundary conditions at t = 0 and seed the
    /// committed history from the material initial states at that solution.
    pub fn initialize(&mut self) -> Result<()> {
        let mut u = DVector::zeros(self.num_dofs());
        self.bcs.apply_initial(&self.dof_map, &mut u)?;
        self.resolved.apply_dirichlet(&mut u, 0.0);
        self.solution = Solution {
            u_new: u.clone(),
            v: DVector::zeros(u.len()),
            u,
        };

        self.assembler.initialize_history();
        let input = AssemblyInput {
            u: &self.solution.u,
            u_old: &self.solution.u,
            coeffs: TimeCoefficients::quasi_static(),
        };
        self.assembler.commit_history(&input)
    }

    /// Start a step: `Unew := U` with Dirichlet values at `time`.
    pub fn prepare_step(&mut self, time: f64) {
        self.solution.u_new.copy_from(&self.solution.u);
        self.resolved.apply_dirichlet(&mut self.solution.u_new, time);
    }

    /// Evaluator for a step ending at `time`, relative to the accepted `U`
    pub fn evaluator(&mut self, time: f64, coeffs: TimeCoefficients) -> StepEvaluator<'_> {
        StepEvaluator {
            assembler: &mut self.assembler,
            system: &mut self.system,
            bcs: &self.resolved,
            u_old: &self.solution.u,
            coeffs,
            time,
        }
    }

    /// Run Newton on `Unew` for a step ending at `time`.
    pub fn solve_step(
        &mut self,
        solver: &NonlinearSolver,
        time: f64,
        coeffs: TimeCoefficients,
    ) -> Result<NewtonReport> {
        let Self {
            assembler,
            system,
            resolved,
            solution,
            ..
        } = self;
        let mut evaluator = StepEvaluator {
            assembler,
            system,
            bcs: resolved,
            u_old: &solution.u,
            coeffs,
            time,
        };
        solver.solve(&mut evaluator, &mut solution.u_new)
    }

    /// Commit a converged step: history at `Unew`, then `V` and `U := Unew`.
    pub fn accept_step(&mut self, dt: f64, coeffs: TimeCoefficients) -> Result<()> {
        let input = AssemblyInput {
            u: &self.solution.u_new,
            u_old: &self.solution.u,
            coeffs,
        };
        self.assembler.commit_history(&input)?;

        self.solution.v = (&self.solution.u_new - &self.solution.u) / dt;
        self.solution.u.copy_from(&self.solution.u_new);
        Ok(())
    }

    /// Recompute and commit the history at the accepted solution
    pub fn commit_history(&mut self) -> Result<()> {
        let input = AssemblyInput {
            u: &self.solution.u,
            u_old: &self.solution.u,
            coeffs: TimeCoefficients::quasi_static(),
        };
        self.assembler.commit_history(&input)
    }

    /// Discard a failed step: `Unew := U`, trial history dropped.
    pub fn reject_step(&mut self) {
        self.solution.u_new.copy_from(&self.solution.u);
        self.assembler.rollback_history();
    }

    /// Nodal projection of stresses and history at the accepted solution
    pub fn project(&self) -> Result<ProjectedFields> {
        let input = AssemblyInput {
            u: &self.solution.u,
            u_old: &self.solution.u,
            coeffs: TimeCoefficients::quasi_static(),
        };
        self.assembler.project(&input)
    }

    /// Committed history of every quadrature point, in assembly order
    pub fn committed_history(&self) -> &[QpState] {
        self.assembler.history().all_old()
    }

    /// Reset solution and history from a checkpoint.
    pub fn restore(&mut self, u: DVector<f64>, v: DVector<f64>, history: Vec<QpState>) -> Result<()> {
        if u.len() != self.num_dofs() || v.len() != self.num_dofs() {
            return Err(FemError::Config(format!(
                "checkpoint holds {} / {} values for {} dofs",
                u.len(),
                v.len(),
                self.num_dofs()
            )));
        }
        self.assembler.history_mut().restore(history)?;
        self.solution = Solution {
            u_new: u.clone(),
            u,
            v,
        };
        Ok(())
    }

    /// Output view of the accepted solution
    pub fn frame<'a>(
        &'a self,
        step: usize,
        time: f64,
        projected: Option<&'a ProjectedFields>,
    ) -> OutputFrame<'a> {
        OutputFrame {
            step,
            time,
            mesh: &self.mesh,
            dof_map: &self.dof_map,
            solution: &self.solution.u,
            rate: &self.solution.v,
            projected,
            history: self.assembler.history().all_old(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeLu;
    use crate::boundary_conditions::{BcValue, DirichletBc, InitialCondition};
    use crate::config::SolverConfig;
    use crate::elements::KernelKind;
    use crate::materials::{MaterialKind, MaterialModel, MaterialParams};

    fn bar(n: usize) -> FeProblem {
        let mesh = Mesh::line(n, 1.0);
        let material = MaterialModel::new(
            MaterialKind::LinearElastic,
            &MaterialParams::from_pairs(&[("E", 100.0), ("nu", 0.3)]),
        )
        .unwrap();
        let mut bcs = BoundaryConditions::new();
        bcs.fix_nodes(&[0], "ux");
        bcs.add_dirichlet(DirichletBc::new(n, "ux", BcValue::Ramp { slope: 0.01 }));
        bcs.add_initial_condition(InitialCondition {
            field: "ux".into(),
            value: 0.5,
            nodes: None,
        });
        FeProblem::new(
            mesh,
            vec![ElementBlock::new("bar", KernelKind::Bar, material, 1.0)],
            bcs,
            AssemblyOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn initialize_applies_conditions_at_time_zero() {
        let mut problem = bar(2);
        problem.initialize().unwrap();
        let u = &problem.solution().u;
        assert_eq!(u.as_slice(), &[0.0, 0.5, 0.0]);
        assert_eq!(problem.solution().u_new, *u);
    }

    #[test]
    fn accepted_step_updates_u_and_rate() {
        let mut problem = bar(4);
        problem.initialize().unwrap();
        let solver = NonlinearSolver::new(SolverConfig::default(), Box::new(NativeLu));
        let coeffs = TimeCoefficients::backward_euler(0.5);
        problem.prepare_step(1.0);
        let report = problem.solve_step(&solver, 1.0, coeffs).unwrap();
        assert!(report.converged());
        // U untouched until the step is accepted
        assert_eq!(problem.solution().u[2], 0.5);

        problem.accept_step(0.5, coeffs).unwrap();
        let sol = problem.solution();
        assert!((sol.u[2] - 0.005).abs() < 1e-12);
        assert!((sol.v[2] - (0.005 - 0.5) / 0.5).abs() < 1e-10);
    }

    #[test]
    fn rejected_step_restores_trial_vector() {
        let mut problem = bar(2);
        problem.initialize().unwrap();
        problem.prepare_step(3.0);
        assert!((problem.solution().u_new[2] - 0.03).abs() < 1e-15);
        problem.reject_step();
        assert_eq!(problem.solution().u_new, problem.solution().u);
    }

    #[test]
    fn restore_checks_sizes() {
        let mut problem = bar(2);
        problem.initialize().unwrap();
        let history = problem.committed_history().to_vec();
        assert!(problem
            .restore(DVector::zeros(2), DVector::zeros(3), history.clone())
            .is_err());
        problem
            .restore(DVector::from_element(3, 1.0), DVector::zeros(3), history)
            .unwrap();
        assert_eq!(problem.solution().u_new[1], 1.0);
    }
}
