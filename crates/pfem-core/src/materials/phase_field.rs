//! Energy-history driven phase-field fracture.
//!
//! The elastic energy is split into a tensile part `ψ⁺` that is degraded by
//! `g(d) = (1 − d)² + k` and a compressive part `ψ⁻` that is not:
//!
//! ```text
//! ψ⁺ = K/2 ⟨tr ε⟩₊² + μ e:e        ψ⁻ = K/2 ⟨tr ε⟩₋²
//! ```
//!
//! Crack irreversibility is enforced through the history field
//! `H = max(H_old, ψ⁺)` which drives the damage equation.

use super::elastic::ElasticConstants;
use super::tensor::{self, Tangent};
use super::{FractureResponse, MaterialParams, MaterialPoint, MaterialResponse};
use crate::error::{FemError, Result};
use crate::state::QpState;
use nalgebra::Matrix3;

/// Name of the fracture driving history variable
pub const HISTORY: &str = "history";

/// Parameters shared by the fracture models
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractureParams {
    /// Critical energy release rate Gc
    pub gc: f64,
    /// Regularisation length L
    pub length: f64,
    /// Viscous regularisation η
    pub viscosity: f64,
    /// Residual stiffness k of the degradation function
    pub stabilizer: f64,
    /// Drive the damage with the last converged history only
    pub use_old_history: bool,
}

impl FractureParams {
    pub fn from_params(params: &MaterialParams, model: &str) -> Result<Self> {
        let gc = params.require("Gc", model)?;
        let length = params.require("L", model)?;
        let viscosity = params.get_or("viscosity", 0.0);
        let stabilizer = params.get_or("stabilizer", 1e-6);
        if gc <= 0.0 || length <= 0.0 {
            return Err(FemError::Config(format!(
                "{model}: Gc and L must be positive (Gc={gc}, L={length})"
            )));
        }
        if viscosity < 0.0 || stabilizer < 0.0 {
            return Err(FemError::Config(format!(
                "{model}: viscosity and stabilizer must be non-negative"
            )));
        }
        Ok(Self {
            gc,
            length,
            viscosity,
            stabilizer,
            use_old_history: params.get_or("use_old_history", 0.0) != 0.0,
        })
    }

    /// g(d) + k
    pub fn degradation(&self, d: f64) -> f64 {
        (1.0 - d) * (1.0 - d) + self.stabilizer
    }

    /// g'(d)
    pub fn degradation_slope(&self, d: f64) -> f64 {
        -2.0 * (1.0 - d)
    }
}

/// Tensile/compressive decomposition of the elastic response
#[derive(Debug, Clone)]
pub(crate) struct EnergySplit {
    pub psi_pos: f64,
    pub stress_pos: Matrix3<f64>,
    pub stress_neg: Matrix3<f64>,
    pub tangent_pos: Tangent,
    pub tangent_neg: Tangent,
}

/// Volumetric/deviatoric split of a small strain
pub(crate) fn split_energy(elastic: &ElasticConstants, strain: &Matrix3<f64>) -> EnergySplit {
    let k = elastic.bulk();
    let mu = elastic.mu;
    let vol = strain.trace();
    let dev = tensor::deviator(strain);
    let (vol_pos, vol_neg) = (vol.max(0.0), vol.min(0.0));
    let (h_pos, h_neg) = if vol > 0.0 { (1.0, 0.0) } else { (0.0, 1.0) };

    EnergySplit {
        psi_pos: 0.5 * k * vol_pos * vol_pos + mu * dev.dot(&dev),
        stress_pos: Matrix3::identity() * (k * vol_pos) + dev * (2.0 * mu),
        stress_neg: Matrix3::identity() * (k * vol_neg),
        tangent_pos: tensor::identity_outer() * (k * h_pos)
            + tensor::deviatoric_projector() * (2.0 * mu),
        tangent_neg: tensor::identity_outer() * (k * h_neg),
    }
}

/// History update shared by the fracture models: returns the stored value,
/// the value driving the damage and whether the driving value follows `ψ⁺`.
pub(crate) fn update_history(params: &FractureParams, old: &QpState, psi_pos: f64) -> (f64, f64, bool) {
    let h_old = old.scalar(HISTORY).unwrap_or(0.0);
    let h_new = h_old.max(psi_pos);
    if params.use_old_history {
        (h_new, h_old, false)
    } else {
        (h_new, h_new, psi_pos > h_old)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseFieldFracture {
    pub elastic: ElasticConstants,
    pub fracture: FractureParams,
}

impl PhaseFieldFracture {
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        Ok(Self {
            elastic: ElasticConstants::from_params(params)?,
            fracture: FractureParams::from_params(params, "PhaseFieldFracture")?,
        })
    }

    pub fn init_state(&self) -> QpState {
        let mut state = QpState::new();
        state.set_scalar(HISTORY, 0.0);
        state
    }

    pub fn evaluate(&self, point: &MaterialPoint, old: &QpState) -> MaterialResponse {
        let strain = tensor::sym(&point.grad_u);
        let split = split_energy(&self.elastic, &strain);
        let d = point.damage;
        let g = self.fracture.degradation(d);

        let stress = split.stress_pos * g + split.stress_neg;
        let tangent = split.tangent_pos * g + split.tangent_neg;

        let (stored, driving, active) = update_history(&self.fracture, old, split.psi_pos);
        let mut state = QpState::new();
        state.set_scalar(HISTORY, stored);

        let mut response = MaterialResponse::mechanical(stress, tangent, state);
        response.fracture = Some(FractureResponse {
            params: self.fracture,
            history: driving,
            dhistory_dgrad_u: if active { split.stress_pos } else { Matrix3::zeros() },
            dhistory_dc: 0.0,
            dstress_ddamage: split.stress_pos * self.fracture.degradation_slope(d),
            dstress_dc: Matrix3::zeros(),
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(use_old: f64) -> PhaseFieldFracture {
        PhaseFieldFracture::from_params(&MaterialParams::from_pairs(&[
            ("lambda", 120.0),
            ("mu", 80.0),
            ("Gc", 2.7e-3),
            ("L", 0.02),
            ("viscosity", 1e-4),
            ("use_old_history", use_old),
        ]))
        .unwrap()
    }

    fn tension() -> MaterialPoint {
        let mut p = MaterialPoint::default();
        p.grad_u[(0, 0)] = 0.01;
        p.grad_u[(1, 0)] = 0.002;
        p
    }

    #[test]
    fn split_recovers_elastic_stress() {
        let mat = material(0.0);
        let strain = tensor::sym(&tension().grad_u);
        let split = split_energy(&mat.elastic, &strain);
        let total = split.stress_pos + split.stress_neg;
        let expected = Matrix3::identity() * (mat.elastic.lambda * strain.trace())
            + strain * (2.0 * mat.elastic.mu);
        assert!((total - expected).norm() < 1e-12);
    }

    #[test]
    fn history_never_decreases() {
        let mat = material(0.0);
        let mut old = mat.init_state();
        old.set_scalar(HISTORY, 1.0);
        let resp = mat.evaluate(&tension(), &old);
        assert_eq!(resp.state.scalar(HISTORY), Some(1.0));
        let frac = resp.fracture.unwrap();
        assert_eq!(frac.dhistory_dgrad_u, Matrix3::zeros());
    }

    #[test]
    fn old_history_drives_damage_when_requested() {
        let mat = material(1.0);
        let resp = mat.evaluate(&tension(), &mat.init_state());
        let frac = resp.fracture.unwrap();
        assert_eq!(frac.history, 0.0);
        assert!(resp.state.scalar(HISTORY).unwrap() > 0.0);
    }

    #[test]
    fn compression_is_not_degraded() {
        let mat = material(0.0);
        let mut p = MaterialPoint::default();
        p.grad_u[(0, 0)] = -0.01;
        p.grad_u[(1, 1)] = -0.01;
        p.damage = 1.0;
        let resp = mat.evaluate(&p, &mat.init_state());
        // hydrostatic part survives full damage
        assert!(resp.stress.trace() < -1.0);
    }
}
