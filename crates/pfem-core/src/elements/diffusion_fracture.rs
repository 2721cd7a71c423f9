//! Swelling solid with species diffusion and phase-field fracture.
//!
//! Local fields `ux, uy, c, d`:
//!
//! ```text
//! R_u = ∫ σ(∇u, c, d) : ∇N
//! R_c = ∫ ċ N + q(∇c, d)·∇N
//! R_d = ∫ [η ḋ N + Gc/L d N + g'(d) H(∇u, c) N + Gc L ∇d·∇N]
//! ```

use super::mechanics::{add_stress_divergence, add_stress_scalar_coupling, add_stress_tangent};
use super::shape;
use super::{
    ComputeMode, ElementBlock, ElementInfo, ElementSolution, LocalContribution,
    displacement_gradient, evaluate_material, missing_response, project_point, scalar_at,
};
use crate::error::Result;
use crate::materials::MaterialPoint;
use crate::state::QpState;

const NF: usize = 4;
const C: usize = 2;
const D: usize = 3;

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

        let c = scalar_at(&shape, solution, NF, C, beta);
        let d = scalar_at(&shape, solution, NF, D, beta);
        let point = MaterialPoint {
            grad_u: displacement_gradient(&shape, solution, NF, 0, 2),
            damage: d.value,
            concentration: c.value,
            grad_concentration: c.grad,
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
        let diff = response
            .diffusion
            .as_ref()
            .ok_or_else(|| missing_response("diffusion", &block.material))?;
        let p = frac.params;
        let dg = p.degradation_slope(d.value);

        add_stress_divergence(&mut out.residual, &shape, w, &response.stress, NF, 0, 2);
        for (a, (&na, dna)) in shape.n.iter().zip(&shape.dn).enumerate() {
            out.residual[a * NF + C] += w * (c.rate * na + diff.flux.dot(dna));
            out.residual[a * NF + D] += w
                * ((p.viscosity * d.rate + p.gc / p.length * d.value + dg * frac.history) * na
                    + p.gc * p.length * d.grad.dot(dna));
        }

        if let Some(k) = out.jacobian.as_mut() {
            let wa = w * alpha;
            add_stress_tangent(k, &shape, wa, &response.tangent, NF, 0, 2);
            add_stress_scalar_coupling(k, &shape, wa, &frac.dstress_dc, NF, 0, 2, C);
            add_stress_scalar_coupling(k, &shape, wa, &frac.dstress_ddamage, NF, 0, 2, D);

            for (a, (&na, dna)) in shape.n.iter().zip(&shape.dn).enumerate() {
                for (b, (&nb, dnb)) in shape.n.iter().zip(&shape.dn).enumerate() {
                    let (rc, rd) = (a * NF + C, a * NF + D);

                    k[(rc, b * NF + C)] +=
                        w * (beta * na * nb + alpha * (diff.dflux_dgrad_c * dnb).dot(dna));
                    k[(rc, b * NF + D)] += wa * diff.dflux_ddamage.dot(dna) * nb;

                    for kk in 0..2 {
                        let mut dh = 0.0;
                        for l in 0..2 {
                            dh += frac.dhistory_dgrad_u[(kk, l)] * dnb[l];
                        }
                        k[(rd, b * NF + kk)] += wa * dg * na * dh;
                    }
                    k[(rd, b * NF + C)] += wa * dg * frac.dhistory_dc * na * nb;
                    k[(rd, b * NF + D)] += w
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
