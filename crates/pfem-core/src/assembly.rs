//! Global assembly of the nonlinear system.
//!
//! The [`Assembler`] owns the element blocks and the double-buffered
//! quadrature-point history. One pass:
//!
//! 1. gather local trial and old values of every element through the DofMap
//! 2. evaluate the element kernels (in parallel when enabled)
//! 3. scatter the local contributions in a fixed element order
//! 4. subtract external nodal loads, `R = F_int − F_ext`
//! 5. replace constrained rows by identity rows with zero residual
//!
//! Kernel evaluation reads the committed history only; scatter happens after
//! the parallel phase so the result does not depend on thread scheduling.

use crate::boundary_conditions::ResolvedBcs;
use crate::dof_map::DofMap;
use crate::elements::{
    self, ComputeMode, ElementBlock, ElementInfo, ElementSolution, LocalContribution,
    TimeCoefficients, shape,
};
use crate::error::{FemError, Result};
use crate::mesh::{ElementType, Mesh};
use crate::sparse_assembly::GlobalSystem;
use crate::state::HistoryBuffer;
use nalgebra::DVector;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Nodal values of projected quadrature-point quantities, by name
pub type ProjectedFields = BTreeMap<String, Vec<f64>>;

/// Assembly settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Evaluate element kernels on the rayon thread pool
    pub parallel: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Solution vectors an assembly pass is evaluated at
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    /// Trial vector `Unew`
    pub u: &'a DVector<f64>,
    /// Accepted vector `U` of the previous step
    pub u_old: &'a DVector<f64>,
    pub coeffs: TimeCoefficients,
}

/// Per-element data fixed at setup
#[derive(Debug, Clone)]
struct ElementEntry {
    id: usize,
    block: usize,
    element_type: ElementType,
    nodes: Vec<usize>,
    coords: Vec<[f64; 3]>,
    dofs: Vec<usize>,
}

/// Element loop, scatter and history management
#[derive(Debug, Clone)]
pub struct Assembler {
    blocks: Vec<ElementBlock>,
    /// Elements in assembly order (by block, then by id)
    elements: Vec<ElementEntry>,
    num_nodes: usize,
    history: HistoryBuffer,
    options: AssemblyOptions,
}

impl Assembler {
    /// Validate the blocks against the mesh and precompute element data.
    pub fn new(
        mesh: &Mesh,
        blocks: Vec<ElementBlock>,
        dof_map: &DofMap,
        options: AssemblyOptions,
    ) -> Result<Self> {
        for block in &blocks {
            block.validate()?;
        }

        let mut elements = Vec::with_capacity(mesh.elements.len());
        for element in &mesh.elements {
            let block = blocks.get(element.block).ok_or_else(|| {
                FemError::Config(format!(
                    "element {} references unknown block {}",
                    element.id, element.block
                ))
            })?;
            if !block.kernel.supports_element(element.element_type) {
                return Err(FemError::Config(format!(
                    "element {}: kernel {:?} of block '{}' does not support {:?}",
                    element.id, block.kernel, block.name, element.element_type
                )));
            }
            elements.push(ElementEntry {
                id: element.id,
                block: element.block,
                element_type: element.element_type,
                nodes: element.nodes.clone(),
                coords: mesh.element_coords(element),
                dofs: dof_map.element_dofs(element)?,
            });
        }
        elements.sort_by_key(|e| (e.block, e.id));

        let layout: Vec<usize> = elements
            .iter()
            .map(|e| shape::quadrature(e.element_type).len())
            .collect();
        let history = HistoryBuffer::with_layout(&layout);

        log::info!(
            "assembler: {} elements in {} blocks, {} quadrature points",
            elements.len(),
            blocks.len(),
            history.num_points()
        );

        Ok(Self {
            blocks,
            elements,
            num_nodes: mesh.num_nodes(),
            history,
            options,
        })
    }

    pub fn blocks(&self) -> &[ElementBlock] {
        &self.blocks
    }

    pub fn options(&self) -> AssemblyOptions {
        self.options
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryBuffer {
        &mut self.history
    }

    /// Evaluate every element kernel; results are in assembly order.
    fn compute_local(
        &self,
        mode: ComputeMode,
        input: &AssemblyInput,
    ) -> Result<Vec<LocalContribution>> {
        let evaluate = |(slot, entry): (usize, &ElementEntry)| -> Result<LocalContribution> {
            let block = &self.blocks[entry.block];
            let solution = ElementSolution {
                values: gather(input.u, &entry.dofs),
                old_values: gather(input.u_old, &entry.dofs),
            };
            let info = ElementInfo {
                id: entry.id,
                element_type: entry.element_type,
                coords: &entry.coords,
                section: block.section,
                coeffs: input.coeffs,
            };
            elements::compute(block, mode, &info, &solution, self.history.old(slot))
        };

        let results: Vec<Result<LocalContribution>> = if self.options.parallel {
            self.elements.par_iter().enumerate().map(evaluate).collect()
        } else {
            self.elements.iter().enumerate().map(evaluate).collect()
        };
        // first failure in assembly order
        results.into_iter().collect()
    }

    /// Assemble residual (and Jacobian in [`ComputeMode::ResidualJacobian`]).
    ///
    /// Trial histories are written to the `new` snapshot in
    /// `ResidualJacobian` mode only.
    pub fn assemble(
        &mut self,
        system: &mut GlobalSystem,
        mode: ComputeMode,
        input: &AssemblyInput,
        bcs: &ResolvedBcs,
        time: f64,
    ) -> Result<()> {
        if !matches!(mode, ComputeMode::ResidualJacobian | ComputeMode::Residual) {
            return Err(FemError::Config(format!(
                "assemble called with non-assembly mode {mode:?}"
            )));
        }
        if input.u.len() != system.num_dofs() || input.u_old.len() != system.num_dofs() {
            return Err(FemError::Config(format!(
                "solution has {} entries but the system has {} dofs",
                input.u.len(),
                system.num_dofs()
            )));
        }

        let locals = self.compute_local(mode, input)?;

        system.reset();
        for (slot, (entry, local)) in self.elements.iter().zip(locals).enumerate() {
            system.add_local(&entry.dofs, &local.residual, local.jacobian.as_ref())?;
            if mode == ComputeMode::ResidualJacobian {
                self.history.store_new(slot, local.states);
            }
        }

        for (dof, value) in &bcs.loads {
            system.residual[*dof] -= value.at(time);
        }
        for dof in bcs.constrained_dofs() {
            system.set_identity_row(dof);
        }
        Ok(())
    }

    /// Seed both history snapshots with the materials' initial state.
    pub fn initialize_history(&mut self) {
        for (slot, entry) in self.elements.iter().enumerate() {
            let material = &self.blocks[entry.block].material;
            let n = self.history.old(slot).len();
            self.history.seed(slot, vec![material.init_state(); n]);
        }
    }

    /// Recompute the history at the converged solution and commit it.
    ///
    /// Repeating the call without a new solve leaves `old` unchanged.
    pub fn commit_history(&mut self, input: &AssemblyInput) -> Result<()> {
        let locals = self.compute_local(ComputeMode::CommitHistory, input)?;
        for (slot, local) in locals.into_iter().enumerate() {
            self.history.store_new(slot, local.states);
        }
        self.history.commit();
        Ok(())
    }

    /// Discard trial history
    pub fn rollback_history(&mut self) {
        self.history.rollback();
    }

    /// Lumped L2 projection of stresses and scalar history to the nodes.
    ///
    /// Each quantity is averaged over the elements that provide it; nodes
    /// outside those elements get zero.
    pub fn project(&self, input: &AssemblyInput) -> Result<ProjectedFields> {
        let locals = self.compute_local(ComputeMode::Project, input)?;

        let mut sums: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for (entry, local) in self.elements.iter().zip(locals) {
            let Some(projection) = local.projection else {
                continue;
            };
            for (name, values) in projection.values {
                let (num, den) = sums
                    .entry(name)
                    .or_insert_with(|| (vec![0.0; self.num_nodes], vec![0.0; self.num_nodes]));
                for (a, &node) in entry.nodes.iter().enumerate() {
                    num[node] += values[a];
                    den[node] += projection.weights[a];
                }
            }
        }

        Ok(sums
            .into_iter()
            .map(|(name, (num, den))| {
                let values = num
                    .iter()
                    .zip(&den)
                    .map(|(n, d)| if *d > 0.0 { n / d } else { 0.0 })
                    .collect();
                (name, values)
            })
            .collect())
    }
}

fn gather(u: &DVector<f64>, dofs: &[usize]) -> DVector<f64> {
    DVector::from_iterator(dofs.len(), dofs.iter().map(|&d| u[d]))
}
