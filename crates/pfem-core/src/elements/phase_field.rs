//! Plane-strain solid with phase-field fracture.
//!
//! Local fields `ux, uy, d`. The damage residual is
//!
//! ```text
//! R_d = ∫ [η ḋ N + Gc/L d N + g'(d) H N + Gc L ∇d·∇N]
//! ```
//!
//! with `g'(d) = −2(1 − d)` and `H` the history driving force supplied by the
//! material.

use super::mechanics::{add_stress_divergence, add_stress_scalar_coupling, add_stress_tangent};
use super::shape;
use super::{
    ComputeMode, ElementBlock, ElementInfo, ElementSolution, LocalContribution,
    displacement_gradient, evaluate_material, missing_response, project_point, scalar_at,
};
use crate::error::Result;
use crate::materials::MaterialPoint;
use crate::state::QpState;

const NF: usize = 3;
const D: usize = 2;

pub fn compute(
    block: &ElementBlock,
    mode: ComputeMode,
    info: &ElementInfo,
    solution: &ElementSolution,
    old: &[QpState],
) -> Result<LocalContribution> {
    let nnodes = info.coords.len();
    let alpha = info.coeffs.alpha;
    let beta = info.coeffs.beta;
    let mut out = LocalContribution::new(nnodes * NF, nnodes, mode);

    for (qp, gp) in shape::quadrature(info.element_type).iter().enumerate() {
        let shape = shape::evaluate(info.element_type, info.coords, gp.xi)?;
        let w = gp.weight * shape.det_j * info.section;

        let d = scalar_at(&shape, solution, NF, D, beta);
        let point = MaterialPoint {
            grad_u: displacement_gradient(&shape, solution, NF, 0, 2),
            damage: d.value,
            ..MaterialPoint::default()
        };
        let response = evaluate_material(
            &block.material,
            block.kernel.stress_state(),
            &point,
            old.get(qp),
            qp,
        )?;
        let frac = response
            .fracture
            .as_ref()
            .ok_or_else(|| missing_response("fracture", &block.material))?;
        let p = frac.params;
        let dg = p.degradation_slope(d.value);

        add_stress_divergence(&mut out.residual, &shape, w, &response.stress, NF, 0, 2);
        for (a, (&na, dna)) in shape.n.iter().zip(&shape.dn).enumerate() {
            out.residual[a * NF + D] += w
                * ((p.viscosity * d.rate + p.gc / p.length * d.value + dg * frac.history) * na
                    + p.gc * p.length * d.grad.dot(dna));
        }

        if let Some(k) = out.jacobian.as_mut() {
            add_stress_tangent(k, &shape, w * alpha, &response.tangent, NF, 0, 2);
            add_stress_scalar_coupling(k, &shape, w * alpha, &frac.dstress_ddamage, NF, 0, 2, D);
            for (a, (&na, dna)) in shape.n.iter().zip(&shape.dn).enumerate() {
                for (b, (&nb, dnb)) in shape.n.iter().zip(&shape.dn).enumerate() {
                    // ∂R_d/∂u through the history
                    for kk in 0..2 {
                        let mut dh = 0.0;
                        for l in 0..2 {
                            dh += frac.dhistory_dgrad_u[(kk, l)] * dnb[l];
                        }
                        k[(a * NF + D, b * NF + kk)] += w * alpha * dg * na * dh;
                    }
                    k[(a * NF + D, b * NF + D)] += w
                        * ((p.viscosity * beta
                            + alpha * (p.gc / p.length + 2.0 * frac.history))
                            * na
                            * nb
                            + alpha * p.gc * p.length * dna.dot(dnb));
                }
            }
        }
        if let Some(proj) = out.projection.as_mut() {
            project_point(proj, &shape, gp.weight * shape.det_j, Some(&response.stress), &response.state);
        }
        out.states.push(response.state);
    }
    Ok(out)
}
