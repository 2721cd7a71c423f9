//! Isotropic linear elasticity and the shared elastic parameter handling.

use super::tensor::{self, Tangent, idx};
use super::{MaterialParams, MaterialPoint, MaterialResponse, StressState};
use crate::error::{FemError, Result};
use crate::state::QpState;
use nalgebra::Matrix3;

/// Lamé constants of an isotropic solid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticConstants {
    /// First Lamé parameter λ
    pub lambda: f64,
    /// Shear modulus μ
    pub mu: f64,
}

impl ElasticConstants {
    /// Read exactly one of the parameter sets `{E, nu}`, `{K, G}` or
    /// `{lambda, mu}`.
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        let sets: [(&str, &str); 3] = [("E", "nu"), ("K", "G"), ("lambda", "mu")];

        let mut found = None;
        for (a, b) in sets {
            match (params.get(a), params.get(b)) {
                (Some(x), Some(y)) => {
                    if found.is_some() {
                        return Err(FemError::Config(format!(
                            "ambiguous elastic parameters: more than one of {{E,nu}}, {{K,G}}, {{lambda,mu}} given ({a},{b} duplicates an earlier set)"
                        )));
                    }
                    found = Some((a, x, y));
                }
                (Some(_), None) | (None, Some(_)) => {
                    return Err(FemError::Config(format!(
                        "incomplete elastic parameters: '{a}' and '{b}' must be given together"
                    )));
                }
                (None, None) => {}
            }
        }

        let constants = match found {
            Some(("E", e, nu)) => {
                if nu <= -1.0 || nu >= 0.5 {
                    return Err(FemError::Config(format!(
                        "Poisson's ratio {nu} outside (-1, 0.5)"
                    )));
                }
                Self {
                    lambda: e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu)),
                    mu: e / (2.0 * (1.0 + nu)),
                }
            }
            Some(("K", k, g)) => Self {
                lambda: k - 2.0 * g / 3.0,
                mu: g,
            },
            Some((_, lambda, mu)) => Self { lambda, mu },
            None => {
                return Err(FemError::Config(
                    "missing elastic parameters: one of {E,nu}, {K,G}, {lambda,mu} is required"
                        .into(),
                ));
            }
        };

        if constants.mu <= 0.0 || constants.bulk() <= 0.0 {
            return Err(FemError::Config(format!(
                "elastic constants must give positive shear and bulk moduli (mu={}, K={})",
                constants.mu,
                constants.bulk()
            )));
        }
        Ok(constants)
    }

    /// Bulk modulus K = λ + 2μ/3
    pub fn bulk(&self) -> f64 {
        self.lambda + 2.0 * self.mu / 3.0
    }

    /// Young's modulus E = μ(3λ + 2μ)/(λ + μ)
    pub fn youngs(&self) -> f64 {
        self.mu * (3.0 * self.lambda + 2.0 * self.mu) / (self.lambda + self.mu)
    }

    /// Small-strain elasticity tensor λ I⊗I + 2μ Isym
    pub fn tangent(&self) -> Tangent {
        tensor::identity_outer() * self.lambda + tensor::symmetric_identity() * (2.0 * self.mu)
    }
}

/// Small-strain isotropic linear elasticity
#[derive(Debug, Clone, PartialEq)]
pub struct LinearElastic {
    pub elastic: ElasticConstants,
}

impl LinearElastic {
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        Ok(Self {
            elastic: ElasticConstants::from_params(params)?,
        })
    }

    pub fn evaluate(&self, stress_state: StressState, point: &MaterialPoint) -> MaterialResponse {
        match stress_state {
            StressState::Uniaxial => {
                let e = self.elastic.youngs();
                let mut stress = Matrix3::zeros();
                stress[(0, 0)] = e * point.grad_u[(0, 0)];
                let mut tangent = Tangent::zeros();
                tangent[(idx(0, 0), idx(0, 0))] = e;
                MaterialResponse::mechanical(stress, tangent, QpState::new())
            }
            StressState::PlaneStrain => {
                let strain = tensor::sym(&point.grad_u);
                let ElasticConstants { lambda, mu } = self.elastic;
                let stress = Matrix3::identity() * (lambda * strain.trace()) + strain * (2.0 * mu);
                MaterialResponse::mechanical(stress, self.elastic.tangent(), QpState::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, f64)]) -> MaterialParams {
        MaterialParams::from_pairs(pairs)
    }

    #[test]
    fn parameter_sets_agree() {
        let from_e = ElasticConstants::from_params(&params(&[("E", 210.0), ("nu", 0.3)])).unwrap();
        let k = from_e.bulk();
        let g = from_e.mu;
        let from_kg = ElasticConstants::from_params(&params(&[("K", k), ("G", g)])).unwrap();
        let from_lame = ElasticConstants::from_params(&params(&[
            ("lambda", from_e.lambda),
            ("mu", from_e.mu),
        ]))
        .unwrap();

        assert!((from_kg.lambda - from_e.lambda).abs() < 1e-10);
        assert!((from_lame.youngs() - 210.0).abs() < 1e-10);
    }

    #[test]
    fn missing_and_ambiguous_sets_are_rejected() {
        assert!(ElasticConstants::from_params(&params(&[])).is_err());
        assert!(ElasticConstants::from_params(&params(&[("E", 1.0)])).is_err());
        let err = ElasticConstants::from_params(&params(&[
            ("E", 1.0),
            ("nu", 0.2),
            ("lambda", 1.0),
            ("mu", 1.0),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn uniaxial_response_uses_youngs_modulus() {
        let mat = LinearElastic::from_params(&params(&[("E", 100.0), ("nu", 0.25)])).unwrap();
        let mut point = MaterialPoint::default();
        point.grad_u[(0, 0)] = 0.01;
        let resp = mat.evaluate(StressState::Uniaxial, &point);
        assert!((resp.stress[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((resp.tangent[(0, 0)] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn plane_strain_stress_is_symmetric() {
        let mat = LinearElastic::from_params(&params(&[("lambda", 1.0), ("mu", 1.0)])).unwrap();
        let mut point = MaterialPoint::default();
        point.grad_u[(0, 1)] = 0.02;
        let resp = mat.evaluate(StressState::PlaneStrain, &point);
        assert!((resp.stress[(0, 1)] - resp.stress[(1, 0)]).abs() < 1e-15);
        assert!((resp.stress[(0, 1)] - 0.02).abs() < 1e-15);
    }
}
