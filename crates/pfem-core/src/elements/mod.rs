//! Element kernels.
//!
//! A kernel turns the local solution of one element into its local residual,
//! its local Jacobian and the trial history of its quadrature points. Kernels
//! only read their inputs; scattering into global structures is the job of the
//! assembler.
//!
//! Local unknowns are ordered node-major, then in the block's field order:
//! local index `a * nf + f` for node `a` and field `f`.

pub mod bar;
pub mod diffusion;
pub mod diffusion_fracture;
pub mod mechanics;
pub mod phase_field;
pub mod shape;

use crate::error::{FemError, Result};
use crate::materials::{MaterialKind, MaterialModel, MaterialPoint, MaterialResponse, StressState};
use crate::mesh::ElementType;
use crate::state::QpState;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use shape::ShapeValues;
use std::collections::BTreeMap;

/// Element physics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    /// Axial bar (Line2, `ux`)
    Bar,
    /// Plane-strain solid (Quad4, `ux, uy`)
    Mechanics,
    /// Plane-strain solid with phase-field fracture (Quad4, `ux, uy, d`)
    PhaseField,
    /// Transient species diffusion (Line2 or Quad4, `c`)
    Diffusion,
    /// Swelling solid with diffusion and fracture (Quad4, `ux, uy, c, d`)
    DiffusionFracture,
}

impl KernelKind {
    /// Field components, in local order
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            KernelKind::Bar => &["ux"],
            KernelKind::Mechanics => &["ux", "uy"],
            KernelKind::PhaseField => &["ux", "uy", "d"],
            KernelKind::Diffusion => &["c"],
            KernelKind::DiffusionFracture => &["ux", "uy", "c", "d"],
        }
    }

    pub fn supports_element(&self, element_type: ElementType) -> bool {
        match self {
            KernelKind::Bar => element_type == ElementType::Line2,
            KernelKind::Diffusion => true,
            _ => element_type == ElementType::Quad4,
        }
    }

    pub fn accepts_material(&self, material: MaterialKind) -> bool {
        use MaterialKind::*;
        match self {
            KernelKind::Bar => matches!(material, LinearElastic | J2Plasticity),
            KernelKind::Mechanics => matches!(material, LinearElastic | NeoHookean | J2Plasticity),
            KernelKind::PhaseField => material == PhaseFieldFracture,
            KernelKind::Diffusion => material == Fick,
            KernelKind::DiffusionFracture => material == DiffusionFracture,
        }
    }

    pub fn stress_state(&self) -> StressState {
        match self {
            KernelKind::Bar => StressState::Uniaxial,
            _ => StressState::PlaneStrain,
        }
    }

    /// Whether the kernel carries a stress field worth projecting
    pub fn has_stress(&self) -> bool {
        !matches!(self, KernelKind::Diffusion)
    }
}

/// A group of elements sharing physics, material and section
#[derive(Debug, Clone)]
pub struct ElementBlock {
    pub name: String,
    pub kernel: KernelKind,
    /// Active field components, in local order
    pub fields: Vec<String>,
    pub material: MaterialModel,
    /// Cross-section area (bars) or thickness (plane elements)
    pub section: f64,
}

impl ElementBlock {
    /// Block activating the kernel's own fields
    pub fn new(name: &str, kernel: KernelKind, material: MaterialModel, section: f64) -> Self {
        Self {
            name: name.to_string(),
            kernel,
            fields: kernel.fields().iter().map(|f| f.to_string()).collect(),
            material,
            section,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let expected = self.kernel.fields();
        if self.fields.len() != expected.len()
            || self.fields.iter().zip(expected).any(|(a, b)| a != b)
        {
            return Err(FemError::Config(format!(
                "block '{}': kernel {:?} requires fields {:?}, got {:?}",
                self.name, self.kernel, expected, self.fields
            )));
        }
        if !self.kernel.accepts_material(self.material.kind()) {
            return Err(FemError::Config(format!(
                "block '{}': material {:?} cannot be used with kernel {:?}",
                self.name,
                self.material.kind(),
                self.kernel
            )));
        }
        if self.section.is_nan() || self.section <= 0.0 {
            return Err(FemError::Config(format!(
                "block '{}': section must be positive, got {}",
                self.name, self.section
            )));
        }
        Ok(())
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

/// What a kernel evaluation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
    /// Residual and Jacobian (Newton iteration)
    ResidualJacobian,
    /// Residual only (line search trials)
    Residual,
    /// Trial history at the converged solution
    CommitHistory,
    /// Nodal projection of output quantities
    Project,
}

/// Time-integration coefficients: `∂value/∂U = alpha`, `∂rate/∂U = beta`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCoefficients {
    pub alpha: f64,
    pub beta: f64,
}

impl TimeCoefficients {
    pub fn backward_euler(dt: f64) -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0 / dt,
        }
    }

    /// Rates vanish, time only scales the loading
    pub fn quasi_static() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
        }
    }
}

/// Geometric data of one element
#[derive(Debug, Clone)]
pub struct ElementInfo<'a> {
    pub id: usize,
    pub element_type: ElementType,
    pub coords: &'a [[f64; 3]],
    pub section: f64,
    pub coeffs: TimeCoefficients,
}

/// Local dof values, node-major in block field order
#[derive(Debug, Clone)]
pub struct ElementSolution {
    /// Trial values
    pub values: DVector<f64>,
    /// Values at the start of the step
    pub old_values: DVector<f64>,
}

/// Lumped L2 projection data of one element
#[derive(Debug, Clone, Default)]
pub struct LocalProjection {
    /// `∫ N_a` per local node
    pub weights: Vec<f64>,
    /// `∫ N_a q` per local node, by quantity name
    pub values: BTreeMap<String, Vec<f64>>,
}

/// Result of one kernel evaluation
#[derive(Debug, Clone)]
pub struct LocalContribution {
    pub residual: DVector<f64>,
    pub jacobian: Option<DMatrix<f64>>,
    pub states: Vec<QpState>,
    pub projection: Option<LocalProjection>,
}

impl LocalContribution {
    fn new(ndofs: usize, nnodes: usize, mode: ComputeMode) -> Self {
        Self {
            residual: DVector::zeros(ndofs),
            jacobian: (mode == ComputeMode::ResidualJacobian).then(|| DMatrix::zeros(ndofs, ndofs)),
            states: Vec::new(),
            projection: (mode == ComputeMode::Project).then(|| LocalProjection {
                weights: vec![0.0; nnodes],
                values: BTreeMap::new(),
            }),
        }
    }
}

/// Evaluate the kernel of `block` on one element.
///
/// Failures carry the element id.
pub fn compute(
    block: &ElementBlock,
    mode: ComputeMode,
    info: &ElementInfo,
    solution: &ElementSolution,
    old: &[QpState],
) -> Result<LocalContribution> {
    let result = match block.kernel {
        KernelKind::Bar => bar::compute(block, mode, info, solution, old),
        KernelKind::Mechanics => mechanics::compute(block, mode, info, solution, old),
        KernelKind::PhaseField => phase_field::compute(block, mode, info, solution, old),
        KernelKind::Diffusion => diffusion::compute(block, mode, info, solution, old),
        KernelKind::DiffusionFracture => {
            diffusion_fracture::compute(block, mode, info, solution, old)
        }
    };
    result.map_err(|e| e.in_element(info.id))
}

/// Scalar field interpolated at a quadrature point
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScalarAtPoint {
    pub value: f64,
    pub rate: f64,
    pub grad: Vector3<f64>,
}

/// Interpolate local field `f` of `nf` at a point.
pub(crate) fn scalar_at(
    shape: &ShapeValues,
    solution: &ElementSolution,
    nf: usize,
    f: usize,
    beta: f64,
) -> ScalarAtPoint {
    let mut value = 0.0;
    let mut old = 0.0;
    let mut grad = Vector3::zeros();
    for (a, (&n, dn)) in shape.n.iter().zip(&shape.dn).enumerate() {
        let v = solution.values[a * nf + f];
        value += n * v;
        old += n * solution.old_values[a * nf + f];
        grad += dn * v;
    }
    ScalarAtPoint {
        value,
        rate: (value - old) * beta,
        grad,
    }
}

/// Displacement gradient from the `dim` displacement fields starting at
/// local field `first`; unused rows and columns stay zero.
pub(crate) fn displacement_gradient(
    shape: &ShapeValues,
    solution: &ElementSolution,
    nf: usize,
    first: usize,
    dim: usize,
) -> Matrix3<f64> {
    let mut h = Matrix3::zeros();
    for (a, dn) in shape.dn.iter().enumerate() {
        for i in 0..dim {
            let u = solution.values[a * nf + first + i];
            for j in 0..dim {
                h[(i, j)] += u * dn[j];
            }
        }
    }
    h
}

/// Material evaluation with quadrature point context on failure
pub(crate) fn evaluate_material(
    material: &MaterialModel,
    stress_state: StressState,
    point: &MaterialPoint,
    old: Option<&QpState>,
    qp: usize,
) -> Result<MaterialResponse> {
    let empty = QpState::new();
    material
        .evaluate(stress_state, point, old.unwrap_or(&empty))
        .map_err(|e| e.at_point(qp))
}

/// Accumulate the lumped projection of one quadrature point
pub(crate) fn project_point(
    projection: &mut LocalProjection,
    shape: &ShapeValues,
    weight: f64,
    stress: Option<&Matrix3<f64>>,
    state: &QpState,
) {
    let mut quantities: Vec<(String, f64)> = Vec::new();
    if let Some(s) = stress {
        quantities.push(("sxx".into(), s[(0, 0)]));
        quantities.push(("syy".into(), s[(1, 1)]));
        quantities.push(("szz".into(), s[(2, 2)]));
        quantities.push(("sxy".into(), s[(0, 1)]));
        quantities.push((
            "vonmises".into(),
            crate::materials::tensor::von_mises(s),
        ));
    }
    for (name, value) in state.scalars() {
        quantities.push((name.to_string(), value));
    }

    let nnodes = shape.n.len();
    for (a, &n) in shape.n.iter().enumerate() {
        projection.weights[a] += n * weight;
    }
    for (name, value) in quantities {
        let slot = projection
            .values
            .entry(name)
            .or_insert_with(|| vec![0.0; nnodes]);
        for (a, &n) in shape.n.iter().enumerate() {
            slot[a] += n * weight * value;
        }
    }
}

/// Missing coupled response for a kernel that needs it
pub(crate) fn missing_response(what: &str, material: &MaterialModel) -> FemError {
    FemError::Config(format!(
        "material {:?} provides no {what} response",
        material.kind()
    ))
}
