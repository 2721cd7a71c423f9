//! Transient species diffusion, `R_c = ∫ ċ N + q·∇N` with the flux `q`
//! supplied by the material.

use super::shape;
use super::{
    ComputeMode, ElementBlock, ElementInfo, ElementSolution, LocalContribution, evaluate_material,
    missing_response, project_point, scalar_at,
};
use crate::error::Result;
use crate::materials::MaterialPoint;
use crate::state::QpState;

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
    let mut out = LocalContribution::new(nnodes, nnodes, mode);

    for (qp, gp) in shape::quadrature(info.element_type).iter().enumerate() {
        let shape = shape::evaluate(info.element_type, info.coords, gp.xi)?;
        let w = gp.weight * shape.det_j * info.section;

        let c = scalar_at(&shape, solution, 1, 0, beta);
        let point = MaterialPoint {
            concentration: c.value,
            grad_concentration: c.grad,
            ..MaterialPoint::default()
        };
        let response = evaluate_material(
            &block.material,
            block.kernel.stress_state(),
            &point,
            old.get(qp),
            qp,
        )?;
        let diff = response
            .diffusion
            .as_ref()
            .ok_or_else(|| missing_response("diffusion", &block.material))?;

        for (a, (&na, dna)) in shape.n.iter().zip(&shape.dn).enumerate() {
            out.residual[a] += w * (c.rate * na + diff.flux.dot(dna));
        }
        if let Some(k) = out.jacobian.as_mut() {
            for (a, (&na, dna)) in shape.n.iter().zip(&shape.dn).enumerate() {
                for (b, (&nb, dnb)) in shape.n.iter().zip(&shape.dn).enumerate() {
                    k[(a, b)] += w * (beta * na * nb + alpha * (diff.dflux_dgrad_c * dnb).dot(dna));
                }
            }
        }
        if let Some(p) = out.projection.as_mut() {
            project_point(p, &shape, gp.weight * shape.det_j, None, &response.state);
        }
        out.states.push(response.state);
    }
    Ok(out)
}
