//! Two-node axial bar.
//!
//! The material sees the uniaxial gradient `∂u/∂x` in the 11 slot of the
//! displacement gradient; the internal force is `σ A` along the bar.

use super::mechanics::{add_stress_divergence, add_stress_tangent};
use super::shape;
use super::{
    ComputeMode, ElementBlock, ElementInfo, ElementSolution, LocalContribution,
    displacement_gradient, evaluate_material, project_point,
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
    let mut out = LocalContribution::new(nnodes, nnodes, mode);

    for (qp, gp) in shape::quadrature(info.element_type).iter().enumerate() {
        let shape = shape::evaluate(info.element_type, info.coords, gp.xi)?;
        let w = gp.weight * shape.det_j * info.section;

        let point = MaterialPoint {
            grad_u: displacement_gradient(&shape, solution, 1, 0, 1),
            ..MaterialPoint::default()
        };
        let response = evaluate_material(
            &block.material,
            block.kernel.stress_state(),
            &point,
            old.get(qp),
            qp,
        )?;

        add_stress_divergence(&mut out.residual, &shape, w, &response.stress, 1, 0, 1);
        if let Some(k) = out.jacobian.as_mut() {
            add_stress_tangent(k, &shape, w * info.coeffs.alpha, &response.tangent, 1, 0, 1);
        }
        if let Some(p) = out.projection.as_mut() {
            project_point(p, &shape, gp.weight * shape.det_j, Some(&response.stress), &response.state);
        }
        out.states.push(response.state);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{KernelKind, TimeCoefficients};
    use crate::materials::{MaterialKind, MaterialModel, MaterialParams};
    use crate::mesh::ElementType;
    use nalgebra::DVector;

    #[test]
    fn stiffness_is_ea_over_l() {
        let material = MaterialModel::new(
            MaterialKind::LinearElastic,
            &MaterialParams::from_pairs(&[("E", 200.0), ("nu", 0.3)]),
        )
        .unwrap();
        let block = ElementBlock::new("bar", KernelKind::Bar, material, 0.5);
        let coords = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        let info = ElementInfo {
            id: 0,
            element_type: ElementType::Line2,
            coords: &coords,
            section: 0.5,
            coeffs: TimeCoefficients::quasi_static(),
        };
        let solution = ElementSolution {
            values: DVector::from_vec(vec![0.0, 0.01]),
            old_values: DVector::zeros(2),
        };
        let out = compute(&block, ComputeMode::ResidualJacobian, &info, &solution, &[]).unwrap();
        let k = out.jacobian.unwrap();
        let ea_l = 200.0 * 0.5 / 2.0;
        assert!((k[(0, 0)] - ea_l).abs() < 1e-10);
        assert!((k[(0, 1)] + ea_l).abs() < 1e-10);
        assert!((out.residual[1] - ea_l * 0.01).abs() < 1e-12);
        assert!((out.residual[0] + out.residual[1]).abs() < 1e-14);
    }
}
