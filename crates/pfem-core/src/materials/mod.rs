//! Constitutive models.
//!
//! A [`MaterialModel`] is a pure function of the old quadrature-point state
//! and the local kinematics: it never mutates its input and may be called any
//! number of times per Newton iteration. Each model is built once from an
//! immutable [`MaterialParams`] set; invalid or ambiguous sets are rejected
//! with a configuration error before any step is taken.

pub mod diffusion;
pub mod elastic;
pub mod neo_hookean;
pub mod phase_field;
pub mod plasticity;
pub mod tensor;

pub use diffusion::{DiffusionFracture, Fick};
pub use elastic::{ElasticConstants, LinearElastic};
pub use neo_hookean::NeoHookean;
pub use phase_field::{FractureParams, PhaseFieldFracture};
pub use plasticity::{Hardening, J2Plasticity};
pub use tensor::Tangent;

use crate::error::{FemError, Result};
use crate::state::QpState;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named material parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialParams(BTreeMap<String, f64>);

impl MaterialParams {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self(pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect())
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    /// Fetch a mandatory parameter of `model`
    pub fn require(&self, name: &str, model: &str) -> Result<f64> {
        let value = self
            .get(name)
            .ok_or_else(|| FemError::Config(format!("{model}: missing parameter '{name}'")))?;
        if !value.is_finite() {
            return Err(FemError::Config(format!(
                "{model}: parameter '{name}' is not finite"
            )));
        }
        Ok(value)
    }
}

/// Material model selector used in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    LinearElastic,
    NeoHookean,
    J2Plasticity,
    PhaseFieldFracture,
    DiffusionFracture,
    Fick,
}

/// Material model plus its parameters, as found in a job description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub model: MaterialKind,
    #[serde(default)]
    pub params: MaterialParams,
}

/// Kinematic assumption the element imposes on the material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressState {
    /// One-dimensional stress (bars); only the 11 components are used
    Uniaxial,
    /// Plane strain; third row and column of the displacement gradient vanish
    PlaneStrain,
}

/// Local solution at a quadrature point
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPoint {
    /// Displacement gradient ∇u
    pub grad_u: Matrix3<f64>,
    /// Phase-field damage d
    pub damage: f64,
    /// Species concentration c
    pub concentration: f64,
    /// Concentration gradient ∇c
    pub grad_concentration: Vector3<f64>,
}

impl Default for MaterialPoint {
    fn default() -> Self {
        Self {
            grad_u: Matrix3::zeros(),
            damage: 0.0,
            concentration: 0.0,
            grad_concentration: Vector3::zeros(),
        }
    }
}

/// Fracture driving terms and their sensitivities
#[derive(Debug, Clone, PartialEq)]
pub struct FractureResponse {
    pub params: FractureParams,
    /// History value driving the damage equation
    pub history: f64,
    /// ∂H/∂(∇u)
    pub dhistory_dgrad_u: Matrix3<f64>,
    /// ∂H/∂c
    pub dhistory_dc: f64,
    /// ∂σ/∂d
    pub dstress_ddamage: Matrix3<f64>,
    /// ∂σ/∂c
    pub dstress_dc: Matrix3<f64>,
}

/// Species flux `q` (the residual carries `q · ∇N`) and its sensitivities
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionResponse {
    pub flux: Vector3<f64>,
    pub dflux_dgrad_c: Matrix3<f64>,
    pub dflux_ddamage: Vector3<f64>,
}

/// Output of a material evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialResponse {
    /// Stress work-conjugate to ∇u
    pub stress: Matrix3<f64>,
    /// ∂stress/∂(∇u)
    pub tangent: Tangent,
    pub fracture: Option<FractureResponse>,
    pub diffusion: Option<DiffusionResponse>,
    /// Trial history
    pub state: QpState,
}

impl MaterialResponse {
    pub fn mechanical(stress: Matrix3<f64>, tangent: Tangent, state: QpState) -> Self {
        Self {
            stress,
            tangent,
            fracture: None,
            diffusion: None,
            state,
        }
    }
}

/// Tagged union over the supported constitutive laws
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialModel {
    LinearElastic(LinearElastic),
    NeoHookean(NeoHookean),
    J2Plasticity(J2Plasticity),
    PhaseFieldFracture(PhaseFieldFracture),
    DiffusionFracture(DiffusionFracture),
    Fick(Fick),
}

impl MaterialModel {
    /// Build and validate a model from its parameter set
    pub fn new(kind: MaterialKind, params: &MaterialParams) -> Result<Self> {
        Ok(match kind {
            MaterialKind::LinearElastic => Self::LinearElastic(LinearElastic::from_params(params)?),
            MaterialKind::NeoHookean => Self::NeoHookean(NeoHookean::from_params(params)?),
            MaterialKind::J2Plasticity => Self::J2Plasticity(J2Plasticity::from_params(params)?),
            MaterialKind::PhaseFieldFracture => {
                Self::PhaseFieldFracture(PhaseFieldFracture::from_params(params)?)
            }
            MaterialKind::DiffusionFracture => {
                Self::DiffusionFracture(DiffusionFracture::from_params(params)?)
            }
            MaterialKind::Fick => Self::Fick(Fick::from_params(params)?),
        })
    }

    pub fn from_spec(spec: &MaterialSpec) -> Result<Self> {
        Self::new(spec.model, &spec.params)
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::LinearElastic(_) => MaterialKind::LinearElastic,
            Self::NeoHookean(_) => MaterialKind::NeoHookean,
            Self::J2Plasticity(_) => MaterialKind::J2Plasticity,
            Self::PhaseFieldFracture(_) => MaterialKind::PhaseFieldFracture,
            Self::DiffusionFracture(_) => MaterialKind::DiffusionFracture,
            Self::Fick(_) => MaterialKind::Fick,
        }
    }

    /// History at t = 0
    pub fn init_state(&self) -> QpState {
        match self {
            Self::J2Plasticity(m) => m.init_state(),
            Self::PhaseFieldFracture(m) => m.init_state(),
            Self::DiffusionFracture(m) => m.init_state(),
            Self::LinearElastic(_) | Self::NeoHookean(_) | Self::Fick(_) => QpState::new(),
        }
    }

    /// Evaluate the constitutive response at one quadrature point.
    pub fn evaluate(
        &self,
        stress_state: StressState,
        point: &MaterialPoint,
        old: &QpState,
    ) -> Result<MaterialResponse> {
        match self {
            Self::LinearElastic(m) => Ok(m.evaluate(stress_state, point)),
            Self::NeoHookean(m) => m.evaluate(point),
            Self::J2Plasticity(m) => m.evaluate(stress_state, point, old),
            Self::PhaseFieldFracture(m) => Ok(m.evaluate(point, old)),
            Self::DiffusionFracture(m) => Ok(m.evaluate(point, old)),
            Self::Fick(m) => Ok(m.evaluate(point)),
        }
    }
}
