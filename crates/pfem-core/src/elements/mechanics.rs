//! Plane-strain continuum kernel and the stress-divergence terms shared with
//! the coupled kernels.

use super::shape::{self, ShapeValues};
use super::{
    ComputeMode, ElementBlock, ElementInfo, ElementSolution, LocalContribution,
    displacement_gradient, evaluate_material, project_point,
};
use crate::error::Result;
use crate::materials::tensor::{Tangent, idx};
use crate::materials::MaterialPoint;
use crate::state::QpState;
use nalgebra::{DMatrix, DVector, Matrix3};

/// `R_(a,i) += w Σ_J σ_iJ ∂N_a/∂X_J`
pub(crate) fn add_stress_divergence(
    r: &mut DVector<f64>,
    shape: &ShapeValues,
    w: f64,
    stress: &Matrix3<f64>,
    nf: usize,
    first: usize,
    dim: usize,
) {
    for (a, dn) in shape.dn.iter().enumerate() {
        for i in 0..dim {
            let mut sum = 0.0;
            for j in 0..dim {
                sum += stress[(i, j)] * dn[j];
            }
            r[a * nf + first + i] += w * sum;
        }
    }
}

/// `K_(a,i)(b,k) += w Σ_JL A_iJkL ∂N_a/∂X_J ∂N_b/∂X_L`
pub(crate) fn add_stress_tangent(
    k: &mut DMatrix<f64>,
    shape: &ShapeValues,
    w: f64,
    tangent: &Tangent,
    nf: usize,
    first: usize,
    dim: usize,
) {
    for (a, dna) in shape.dn.iter().enumerate() {
        for (b, dnb) in shape.dn.iter().enumerate() {
            for i in 0..dim {
                for kk in 0..dim {
                    let mut sum = 0.0;
                    for j in 0..dim {
                        for l in 0..dim {
                            sum += tangent[(idx(i, j), idx(kk, l))] * dna[j] * dnb[l];
                        }
                    }
                    k[(a * nf + first + i, b * nf + first + kk)] += w * sum;
                }
            }
        }
    }
}

/// `K_(a,i)(b,f) += w Σ_J S_iJ ∂N_a/∂X_J N_b` for a stress sensitivity `S`
/// with respect to the scalar field `f`
#[allow(clippy::too_many_arguments)]
pub(crate) fn add_stress_scalar_coupling(
    k: &mut DMatrix<f64>,
    shape: &ShapeValues,
    w: f64,
    dstress: &Matrix3<f64>,
    nf: usize,
    first: usize,
    dim: usize,
    f: usize,
) {
    for (a, dna) in shape.dn.iter().enumerate() {
        for (b, &nb) in shape.n.iter().enumerate() {
            for i in 0..dim {
                let mut sum = 0.0;
                for j in 0..dim {
                    sum += dstress[(i, j)] * dna[j];
                }
                k[(a * nf + first + i, b * nf + f)] += w * sum * nb;
            }
        }
    }
}

pub fn compute(
    block: &ElementBlock,
    mode: ComputeMode,
    info: &ElementInfo,
    solution: &ElementSolution,
    old: &[QpState],
) -> Result<LocalContribution> {
    let nf = block.num_fields();
    let nnodes = info.coords.len();
    let alpha = info.coeffs.alpha;
    let mut out = LocalContribution::new(nnodes * nf, nnodes, mode);

    for (qp, gp) in shape::quadrature(info.element_type).iter().enumerate() {
        let shape = shape::evaluate(info.element_type, info.coords, gp.xi)?;
        let w = gp.weight * shape.det_j * info.section;

        let point = MaterialPoint {
            grad_u: displacement_gradient(&shape, solution, nf, 0, 2),
            ..MaterialPoint::default()
        };
        let response = evaluate_material(
            &block.material,
            block.kernel.stress_state(),
            &point,
            old.get(qp),
            qp,
        )?;

        add_stress_divergence(&mut out.residual, &shape, w, &response.stress, nf, 0, 2);
        if let Some(k) = out.jacobian.as_mut() {
            add_stress_tangent(k, &shape, w * alpha, &response.tangent, nf, 0, 2);
        }
        if let Some(p) = out.projection.as_mut() {
            project_point(p, &shape, gp.weight * shape.det_j, Some(&response.stress), &response.state);
        }
        out.states.push(response.state);
    }
    Ok(out)
}
