//! Small-strain J2 (von Mises) plasticity with saturation hardening.
//!
//! The yield stress follows
//! `σy(α) = σy0 + h α + (σ∞ − σy0)(1 − exp(−δ α))`
//! where `α` is the equivalent plastic strain. The radial return is solved by
//! a scalar Newton iteration; the returned tangent is the consistent
//! (algorithmic) elastoplastic modulus.
//!
//! History: `plastic_strain` (tensor), `eqp` (scalar).

use super::elastic::ElasticConstants;
use super::tensor::{self, Tangent, idx};
use super::{MaterialParams, MaterialPoint, MaterialResponse, StressState};
use crate::error::{FemError, Result};
use crate::state::QpState;
use nalgebra::Matrix3;

const SQRT_2_3: f64 = 0.816_496_580_927_726;

/// Saturation-type isotropic hardening law
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hardening {
    pub yield_stress: f64,
    pub modulus: f64,
    pub saturation_stress: f64,
    pub saturation_exponent: f64,
}

impl Hardening {
    /// Current yield stress
    pub fn yield_stress(&self, alpha: f64) -> f64 {
        self.yield_stress
            + self.modulus * alpha
            + (self.saturation_stress - self.yield_stress)
                * (1.0 - (-self.saturation_exponent * alpha).exp())
    }

    /// dσy/dα
    pub fn slope(&self, alpha: f64) -> f64 {
        self.modulus
            + (self.saturation_stress - self.yield_stress)
                * self.saturation_exponent
                * (-self.saturation_exponent * alpha).exp()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct J2Plasticity {
    pub elastic: ElasticConstants,
    pub hardening: Hardening,
    /// Iteration bound of the local return mapping
    pub max_local_iters: usize,
}

impl J2Plasticity {
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        let elastic = ElasticConstants::from_params(params)?;
        let yield_stress = params.require("yield_stress", "J2Plasticity")?;
        if yield_stress <= 0.0 {
            return Err(FemError::Config(format!(
                "J2Plasticity: yield_stress must be positive, got {yield_stress}"
            )));
        }
        let hardening = Hardening {
            yield_stress,
            modulus: params.get_or("hardening_modulus", 0.0),
            saturation_stress: params.get_or("saturation_stress", yield_stress),
            saturation_exponent: params.get_or("saturation_exponent", 0.0),
        };
        if hardening.modulus < 0.0 || hardening.saturation_exponent < 0.0 {
            return Err(FemError::Config(
                "J2Plasticity: hardening_modulus and saturation_exponent must be non-negative"
                    .into(),
            ));
        }
        let max_local_iters = params.get_or("max_local_iters", 50.0);
        if max_local_iters < 1.0 || max_local_iters.fract() != 0.0 {
            return Err(FemError::Config(format!(
                "J2Plasticity: max_local_iters must be a positive integer, got {max_local_iters}"
            )));
        }
        Ok(Self {
            elastic,
            hardening,
            max_local_iters: max_local_iters as usize,
        })
    }

    pub fn init_state(&self) -> QpState {
        let mut state = QpState::new();
        state.set_tensor("plastic_strain", Matrix3::zeros());
        state.set_scalar("eqp", 0.0);
        state
    }

    pub fn evaluate(
        &self,
        stress_state: StressState,
        point: &MaterialPoint,
        old: &QpState,
    ) -> Result<MaterialResponse> {
        let eps_p_old = old.tensor("plastic_strain").unwrap_or_else(Matrix3::zeros);
        let alpha_old = old.scalar("eqp").unwrap_or(0.0);
        match stress_state {
            StressState::Uniaxial => self.return_uniaxial(point, &eps_p_old, alpha_old),
            StressState::PlaneStrain => self.return_radial(point, &eps_p_old, alpha_old),
        }
    }

    /// Scalar Newton on the consistency condition `g(Δγ) = 0`.
    fn solve_consistency<G>(&self, g: G) -> Result<f64>
    where
        G: Fn(f64) -> (f64, f64),
    {
        let tol = 1e-12 * self.hardening.yield_stress;
        let mut dgamma = 0.0;
        for _ in 0..self.max_local_iters {
            let (r, dr) = g(dgamma);
            if r.abs() <= tol {
                return Ok(dgamma);
            }
            dgamma = (dgamma - r / dr).max(0.0);
        }
        let (r, _) = g(dgamma);
        if r.abs() <= tol {
            return Ok(dgamma);
        }
        Err(FemError::Convergence(format!(
            "return mapping did not converge in {} iterations (|g| = {:.3e})",
            self.max_local_iters,
            r.abs()
        )))
    }

    fn yield_tolerance(&self) -> f64 {
        1e-10 * self.hardening.yield_stress
    }

    fn return_radial(
        &self,
        point: &MaterialPoint,
        eps_p_old: &Matrix3<f64>,
        alpha_old: f64,
    ) -> Result<MaterialResponse> {
        let ElasticConstants { mu, .. } = self.elastic;
        let k = self.elastic.bulk();
        let strain = tensor::sym(&point.grad_u);
        let vol = strain.trace();
        let s_trial = (tensor::deviator(&strain) - eps_p_old) * (2.0 * mu);
        let s_norm = s_trial.norm();
        let f_trial = s_norm - SQRT_2_3 * self.hardening.yield_stress(alpha_old);

        let elastic_tangent =
            tensor::identity_outer() * k + tensor::deviatoric_projector() * (2.0 * mu);

        if f_trial <= self.yield_tolerance() {
            let stress = Matrix3::identity() * (k * vol) + s_trial;
            let mut state = QpState::new();
            state.set_tensor("plastic_strain", *eps_p_old);
            state.set_scalar("eqp", alpha_old);
            return Ok(MaterialResponse::mechanical(stress, elastic_tangent, state));
        }

        let h = self.hardening;
        let dgamma = self.solve_consistency(
            |dg| {
                let alpha = alpha_old + SQRT_2_3 * dg;
                (
                    s_norm - 2.0 * mu * dg - SQRT_2_3 * h.yield_stress(alpha),
                    -2.0 * mu - 2.0 / 3.0 * h.slope(alpha),
                )
            },
        )?;

        let n = s_trial / s_norm;
        let alpha = alpha_old + SQRT_2_3 * dgamma;
        let stress = Matrix3::identity() * (k * vol) + s_trial - n * (2.0 * mu * dgamma);

        let theta = 1.0 - 2.0 * mu * dgamma / s_norm;
        let theta_bar = 1.0 / (1.0 + h.slope(alpha) / (3.0 * mu)) - (1.0 - theta);
        let tangent: Tangent = tensor::identity_outer() * k
            + tensor::deviatoric_projector() * (2.0 * mu * theta)
            - tensor::outer(&n, &n) * (2.0 * mu * theta_bar);

        let mut state = QpState::new();
        state.set_tensor("plastic_strain", eps_p_old + n * dgamma);
        state.set_scalar("eqp", alpha);
        Ok(MaterialResponse::mechanical(stress, tangent, state))
    }

    fn return_uniaxial(
        &self,
        point: &MaterialPoint,
        eps_p_old: &Matrix3<f64>,
        alpha_old: f64,
    ) -> Result<MaterialResponse> {
        let e = self.elastic.youngs();
        let eps_p = eps_p_old[(0, 0)];
        let sigma_trial = e * (point.grad_u[(0, 0)] - eps_p);
        let f_trial = sigma_trial.abs() - self.hardening.yield_stress(alpha_old);

        let mut stress = Matrix3::zeros();
        let mut tangent = Tangent::zeros();
        let mut plastic_strain = Matrix3::zeros();

        if f_trial <= self.yield_tolerance() {
            stress[(0, 0)] = sigma_trial;
            tangent[(idx(0, 0), idx(0, 0))] = e;
            plastic_strain[(0, 0)] = eps_p;
            let mut state = QpState::new();
            state.set_tensor("plastic_strain", plastic_strain);
            state.set_scalar("eqp", alpha_old);
            return Ok(MaterialResponse::mechanical(stress, tangent, state));
        }

        let h = self.hardening;
        let abs_trial = sigma_trial.abs();
        let dgamma = self.solve_consistency(
            |dg| {
                let alpha = alpha_old + dg;
                (
                    abs_trial - e * dg - h.yield_stress(alpha),
                    -e - h.slope(alpha),
                )
            },
        )?;
        let sign = sigma_trial.signum();
        let alpha = alpha_old + dgamma;
        let slope = h.slope(alpha);

        stress[(0, 0)] = sigma_trial - e * dgamma * sign;
        tangent[(idx(0, 0), idx(0, 0))] = e * slope / (e + slope);
        plastic_strain[(0, 0)] = eps_p + dgamma * sign;

        let mut state = QpState::new();
        state.set_tensor("plastic_strain", plastic_strain);
        state.set_scalar("eqp", alpha);
        Ok(MaterialResponse::mechanical(stress, tangent, state))
    }
}
