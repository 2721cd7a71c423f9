//! Compressible Neo-Hookean hyperelasticity.
//!
//! Strain energy `ψ = μ/2 (I₁ − 3) − μ ln J + λ/2 (ln J)²`, written in terms of
//! the deformation gradient `F = I + ∇u`. The stress returned is the first
//! Piola–Kirchhoff stress and the tangent is `∂P/∂F`.

use super::elastic::ElasticConstants;
use super::tensor::{Tangent, idx};
use super::{MaterialParams, MaterialPoint, MaterialResponse};
use crate::error::{FemError, Result};
use crate::state::QpState;
use nalgebra::Matrix3;

#[derive(Debug, Clone, PartialEq)]
pub struct NeoHookean {
    pub elastic: ElasticConstants,
}

impl NeoHookean {
    pub fn from_params(params: &MaterialParams) -> Result<Self> {
        Ok(Self {
            elastic: ElasticConstants::from_params(params)?,
        })
    }

    pub fn evaluate(&self, point: &MaterialPoint) -> Result<MaterialResponse> {
        let ElasticConstants { lambda, mu } = self.elastic;
        let f = Matrix3::identity() + point.grad_u;
        let j = f.determinant();
        if j <= 0.0 {
            return Err(FemError::Numerical(format!(
                "non-positive Jacobian det F = {j:.6e}"
            )));
        }
        let f_inv = f
            .try_inverse()
            .ok_or_else(|| FemError::Numerical("deformation gradient is not invertible".into()))?;
        let f_inv_t = f_inv.transpose();
        let ln_j = j.ln();

        let stress = (f - f_inv_t) * mu + f_inv_t * (lambda * ln_j);

        // A_iJkL = μ δik δJL + (μ − λ ln J) F⁻¹_Jk F⁻¹_Li + λ F⁻¹_Ji F⁻¹_Lk
        let mut tangent = Tangent::zeros();
        for i in 0..3 {
            for jj in 0..3 {
                for k in 0..3 {
                    for l in 0..3 {
                        let mut a = (mu - lambda * ln_j) * f_inv[(jj, k)] * f_inv[(l, i)]
                            + lambda * f_inv[(jj, i)] * f_inv[(l, k)];
                        if i == k && jj == l {
                            a += mu;
                        }
                        tangent[(idx(i, jj), idx(k, l))] = a;
                    }
                }
            }
        }

        let mut state = QpState::new();
        state.set_scalar("jacobian", j);
        Ok(MaterialResponse::mechanical(stress, tangent, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> NeoHookean {
        NeoHookean::from_params(&MaterialParams::from_pairs(&[("lambda", 60.0), ("mu", 40.0)]))
            .unwrap()
    }

    #[test]
    fn stress_free_in_reference_configuration() {
        let resp = material().evaluate(&MaterialPoint::default()).unwrap();
        assert!(resp.stress.norm() < 1e-14);
        // reference tangent reduces to linear elasticity
        let c = material().elastic.tangent();
        assert!((resp.tangent - c).norm() < 1e-10 * c.norm() + 1e-12);
    }

    #[test]
    fn tangent_matches_finite_differences() {
        let mat = material();
        let mut point = MaterialPoint::default();
        point.grad_u = Matrix3::new(0.05, 0.02, 0.0, -0.01, 0.08, 0.0, 0.0, 0.0, 0.0);
        let base = mat.evaluate(&point).unwrap();
        let h = 1e-6;
        for k in 0..2 {
            for l in 0..2 {
                let mut plus = point.clone();
                let mut minus = point.clone();
                plus.grad_u[(k, l)] += h;
                minus.grad_u[(k, l)] -= h;
                let dp = (mat.evaluate(&plus).unwrap().stress
                    - mat.evaluate(&minus).unwrap().stress)
                    / (2.0 * h);
                for i in 0..3 {
                    for j in 0..3 {
                        let exact = base.tangent[(idx(i, j), idx(k, l))];
                        assert!(
                            (dp[(i, j)] - exact).abs() < 1e-5 * (1.0 + exact.abs()),
                            "dP_{i}{j}/dF_{k}{l}: fd {} vs {}",
                            dp[(i, j)],
                            exact
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn inverted_element_is_numerical_error() {
        let mut point = MaterialPoint::default();
        point.grad_u[(0, 0)] = -1.5;
        let err = material().evaluate(&point).unwrap_err();
        assert!(matches!(err, FemError::Numerical(_)));
    }
}
