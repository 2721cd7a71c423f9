//! Species diffusion: plain Fick's law and diffusion coupled to phase-field
//! fracture.

use super::elastic::ElasticConstants;
use super::phase_field::{self, FractureParams, HISTORY};
use super::tensor::{self, Tangent};
use super::{
    DiffusionResponse, FractureResponse, MaterialParams, MaterialPoint, MaterialResponse,
};
use crate::error::{FemError, Result};
use crate::state::QpState;
use nalgebra::{Matrix3, Vector3};

/// Linear isotropic diffusion, flux `D ∇c`
#[derive(Debug, Clone, PartialEq)]
pub struct Fick {
    pub diffusivity: f64,
}

impl Fick {
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        let diffusivity = params.require("D", "Fick")?;
        if diffusivity <= 0.0 {
            return Err(FemError::Config(format!(
                "Fick: D must be positive, got {diffusivity}"
            )));
        }
        Ok(Self { diffusivity })
    }

    pub fn evaluate(&self, point: &MaterialPoint) -> MaterialResponse {
        let mut response =
            MaterialResponse::mechanical(Matrix3::zeros(), Tangent::zeros(), QpState::new());
        response.diffusion = Some(DiffusionResponse {
            flux: point.grad_concentration * self.diffusivity,
            dflux_dgrad_c: Matrix3::identity() * self.diffusivity,
            dflux_ddamage: Vector3::zeros(),
        });
        response
    }
}

/// Phase-field fracture of a solid swelling with a diffusing species.
///
/// The concentration enters the mechanics as the eigenstrain `ω c I`, and
/// damage accelerates transport through `D(d) = D (1 + kd d)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionFracture {
    pub elastic: ElasticConstants,
    pub fracture: FractureParams,
    pub diffusivity: f64,
    /// Swelling coefficient ω
    pub omega: f64,
    /// Damage enhancement of the diffusivity
    pub kd: f64,
}

impl DiffusionFracture {
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        let diffusivity = params.require("D", "DiffusionFracture")?;
        if diffusivity <= 0.0 {
            return Err(FemError::Config(format!(
                "DiffusionFracture: D must be positive, got {diffusivity}"
            )));
        }
        let kd = params.get_or("kd", 0.0);
        if kd < 0.0 {
            return Err(FemError::Config(
                "DiffusionFracture: kd must be non-negative".into(),
            ));
        }
        Ok(Self {
            elastic: ElasticConstants::from_params(params)?,
            fracture: FractureParams::from_params(params, "DiffusionFracture")?,
            diffusivity,
            omega: params.require("omega", "DiffusionFracture")?,
            kd,
        })
    }

    pub fn init_state(&self) -> QpState {
        let mut state = QpState::new();
        state.set_scalar(HISTORY, 0.0);
        state
    }

    pub fn evaluate(&self, point: &MaterialPoint, old: &QpState) -> MaterialResponse {
        let c = point.concentration;
        let d = point.damage;
        let strain = tensor::sym(&point.grad_u) - Matrix3::identity() * (self.omega * c);
        let split = phase_field::split_energy(&self.elastic, &strain);
        let g = self.fracture.degradation(d);

        let stress = split.stress_pos * g + split.stress_neg;
        let tangent = split.tangent_pos * g + split.tangent_neg;
        let dstress_dc = tensor::contract(&tangent, &Matrix3::identity()) * (-self.omega);

        let (stored, driving, active) =
            phase_field::update_history(&self.fracture, old, split.psi_pos);
        let mut state = QpState::new();
        state.set_scalar(HISTORY, stored);

        let diffusivity = self.diffusivity * (1.0 + self.kd * d);
        let mut response = MaterialResponse::mechanical(stress, tangent, state);
        response.fracture = Some(FractureResponse {
            params: self.fracture,
            history: driving,
            dhistory_dgrad_u: if active { split.stress_pos } else { Matrix3::zeros() },
            dhistory_dc: if active {
                -self.omega * split.stress_pos.trace()
            } else {
                0.0
            },
            dstress_ddamage: split.stress_pos * self.fracture.degradation_slope(d),
            dstress_dc,
        });
        response.diffusion = Some(DiffusionResponse {
            flux: point.grad_concentration * diffusivity,
            dflux_dgrad_c: Matrix3::identity() * diffusivity,
            dflux_ddamage: point.grad_concentration * (self.diffusivity * self.kd),
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> DiffusionFracture {
        DiffusionFracture::from_params(&MaterialParams::from_pairs(&[
            ("E", 100.0),
            ("nu", 0.25),
            ("Gc", 0.01),
            ("L", 0.05),
            ("D", 2.0),
            ("omega", 0.1),
            ("kd", 3.0),
        ]))
        .unwrap()
    }

    #[test]
    fn fick_requires_diffusivity() {
        assert!(Fick::from_params(&MaterialParams::new()).is_err());
        let fick = Fick::from_params(&MaterialParams::from_pairs(&[("D", 0.5)])).unwrap();
        let mut p = MaterialPoint::default();
        p.grad_concentration = Vector3::new(2.0, 0.0, 0.0);
        let resp = fick.evaluate(&p);
        assert_eq!(resp.diffusion.unwrap().flux, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn equibiaxial_swelling_gives_equibiaxial_stress() {
        let mat = material();
        let mut p = MaterialPoint::default();
        p.concentration = 0.2;
        p.grad_u[(0, 0)] = 0.02;
        p.grad_u[(1, 1)] = 0.02;
        let resp = mat.evaluate(&p, &mat.init_state());
        assert!(resp.stress[(0, 1)].abs() < 1e-14);
        assert!((resp.stress[(0, 0)] - resp.stress[(1, 1)]).abs() < 1e-12);
        // out-of-plane swelling is constrained
        assert!(resp.stress[(2, 2)] < 0.0);
    }

    #[test]
    fn concentration_derivatives_match_finite_differences() {
        let mat = material();
        let mut p = MaterialPoint::default();
        p.grad_u[(0, 0)] = 0.03;
        p.grad_u[(0, 1)] = 0.01;
        p.concentration = 0.05;
        p.damage = 0.3;
        let old = mat.init_state();
        let base = mat.evaluate(&p, &old);
        let frac = base.fracture.clone().unwrap();

        let h = 1e-6;
        let mut plus = p.clone();
        let mut minus = p.clone();
        plus.concentration += h;
        minus.concentration -= h;
        let rp = mat.evaluate(&plus, &old);
        let rm = mat.evaluate(&minus, &old);
        let ds = (rp.stress - rm.stress) / (2.0 * h);
        assert!((ds - frac.dstress_dc).norm() < 1e-6 * (1.0 + frac.dstress_dc.norm()));
        let dh = (rp.fracture.unwrap().history - rm.fracture.unwrap().history) / (2.0 * h);
        assert!((dh - frac.dhistory_dc).abs() < 1e-6 * (1.0 + frac.dhistory_dc.abs()));
    }
}
