//! Boundary and initial conditions.
//!
//! This module handles:
//! - Dirichlet conditions on `(node, field)` pairs
//! - Concentrated nodal loads, entering the residual as `−F_ext`
//! - Loads distributed along straight boundary edges (traction or flux per
//!   unit length), lumped consistently onto the edge's end nodes
//! - Initial values of the solution fields
//!
//! Conditions are stated on node/field names and resolved to global dofs
//! once the DofMap exists.

use crate::dof_map::DofMap;
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time dependence of a prescribed value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BcValue {
    Constant(f64),
    /// `value(t) = slope · t`
    Ramp { slope: f64 },
    /// `value(t) = start + slope · t`
    Linear { start: f64, slope: f64 },
}

impl BcValue {
    pub fn at(&self, time: f64) -> f64 {
        match *self {
            BcValue::Constant(v) => v,
            BcValue::Ramp { slope } => slope * time,
            BcValue::Linear { start, slope } => start + slope * time,
        }
    }

    /// The same time dependence multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        match *self {
            BcValue::Constant(v) => BcValue::Constant(factor * v),
            BcValue::Ramp { slope } => BcValue::Ramp {
                slope: factor * slope,
            },
            BcValue::Linear { start, slope } => BcValue::Linear {
                start: factor * start,
                slope: factor * slope,
            },
        }
    }
}

/// Prescribed value of one field at one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletBc {
    pub node: usize,
    pub field: String,
    pub value: BcValue,
}

impl DirichletBc {
    pub fn new(node: usize, field: &str, value: BcValue) -> Self {
        Self {
            node,
            field: field.to_string(),
            value,
        }
    }

    /// Homogeneous condition
    pub fn fixed(node: usize, field: &str) -> Self {
        Self::new(node, field, BcValue::Constant(0.0))
    }
}

/// A concentrated load on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    pub node: usize,
    pub field: String,
    pub value: BcValue,
}

impl NodalLoad {
    pub fn new(node: usize, field: &str, value: BcValue) -> Self {
        Self {
            node,
            field: field.to_string(),
            value,
        }
    }
}

/// Load per unit length on the straight edge between two nodes.
///
/// With linear interpolation along the edge each end node receives
/// `value · length / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeLoad {
    pub nodes: [usize; 2],
    pub field: String,
    pub value: BcValue,
}

impl EdgeLoad {
    pub fn new(nodes: [usize; 2], field: &str, value: BcValue) -> Self {
        Self {
            nodes,
            field: field.to_string(),
            value,
        }
    }
}

/// Initial value of a field, on the listed nodes or everywhere it is active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    pub field: String,
    pub value: f64,
    #[serde(default)]
    pub nodes: Option<Vec<usize>>,
}

/// Boundary conditions, nodal loads and initial values of a problem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConditions {
    pub dirichlet: Vec<DirichletBc>,
    pub loads: Vec<NodalLoad>,
    pub edge_loads: Vec<EdgeLoad>,
    pub initial: Vec<InitialCondition>,
}

impl BoundaryConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dirichlet(&mut self, bc: DirichletBc) {
        self.dirichlet.push(bc);
    }

    /// Fix `field` to zero on every node in `nodes`
    pub fn fix_nodes(&mut self, nodes: &[usize], field: &str) {
        for &node in nodes {
            self.dirichlet.push(DirichletBc::fixed(node, field));
        }
    }

    pub fn add_load(&mut self, load: NodalLoad) {
        self.loads.push(load);
    }

    pub fn add_edge_load(&mut self, load: EdgeLoad) {
        self.edge_loads.push(load);
    }

    pub fn add_initial_condition(&mut self, ic: InitialCondition) {
        self.initial.push(ic);
    }

    /// Translate node/field references into global dofs.
    pub fn resolve(&self, mesh: &Mesh, dof_map: &DofMap) -> Result<ResolvedBcs> {
        let lookup = |node: usize, field: &str, what: &str| {
            dof_map.dof(node, field).ok_or_else(|| {
                FemError::Config(format!(
                    "{what} on node {node}: field '{field}' is not active there"
                ))
            })
        };

        // later conditions on the same dof win
        let mut dirichlet = BTreeMap::new();
        for bc in &self.dirichlet {
            dirichlet.insert(lookup(bc.node, &bc.field, "boundary condition")?, bc.value);
        }
        let mut loads = Vec::with_capacity(self.loads.len());
        for load in &self.loads {
            loads.push((lookup(load.node, &load.field, "nodal load")?, load.value));
        }
        for edge in &self.edge_loads {
            let [a, b] = edge.nodes;
            if a == b || a >= mesh.num_nodes() || b >= mesh.num_nodes() {
                return Err(FemError::Config(format!(
                    "edge load on nodes {a}-{b}: not an edge of the mesh"
                )));
            }
            let (pa, pb) = (mesh.nodes[a].coords, mesh.nodes[b].coords);
            let length = pa
                .iter()
                .zip(&pb)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt();
            let share = edge.value.scaled(0.5 * length);
            loads.push((lookup(a, &edge.field, "edge load")?, share));
            loads.push((lookup(b, &edge.field, "edge load")?, share));
        }
        for ic in &self.initial {
            if dof_map.field_index(&ic.field).is_none() {
                return Err(FemError::Config(format!(
                    "initial condition on unknown field '{}'",
                    ic.field
                )));
            }
            if let Some(nodes) = &ic.nodes {
                for &node in nodes {
                    lookup(node, &ic.field, "initial condition")?;
                }
            }
        }

        log::debug!(
            "resolved {} constrained dofs, {} nodal loads",
            dirichlet.len(),
            loads.len()
        );

        Ok(ResolvedBcs {
            dirichlet: dirichlet.into_iter().collect(),
            loads,
        })
    }

    /// Write the initial conditions into `u`; conditions apply in order.
    pub fn apply_initial(&self, dof_map: &DofMap, u: &mut DVector<f64>) -> Result<()> {
        for ic in &self.initial {
            match &ic.nodes {
                Some(nodes) => {
                    for &node in nodes {
                        let dof = dof_map.dof(node, &ic.field).ok_or_else(|| {
                            FemError::Config(format!(
                                "initial condition on node {node}: field '{}' is not active there",
                                ic.field
                            ))
                        })?;
                        u[dof] = ic.value;
                    }
                }
                None => {
                    for node in 0..dof_map.num_nodes() {
                        if let Some(dof) = dof_map.dof(node, &ic.field) {
                            u[dof] = ic.value;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Boundary conditions indexed by global dof
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedBcs {
    /// Constrained dofs in ascending order
    pub dirichlet: Vec<(usize, BcValue)>,
    pub loads: Vec<(usize, BcValue)>,
}

impl ResolvedBcs {
    /// Overwrite the constrained entries of `u` with their values at `time`
    pub fn apply_dirichlet(&self, u: &mut DVector<f64>, time: f64) {
        for (dof, value) in &self.dirichlet {
            u[*dof] = value.at(time);
        }
    }

    pub fn constrained_dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirichlet.iter().map(|(dof, _)| *dof)
    }

    /// External load vector at `time`
    pub fn load_vector(&self, num_dofs: usize, time: f64) -> DVector<f64> {
        let mut f = DVector::zeros(num_dofs);
        for (dof, value) in &self.loads {
            f[*dof] += value.at(time);
        }
        f
    }
}
