//! Gauss quadrature and isoparametric shape functions for Line2 and Quad4.

use crate::error::{FemError, Result};
use crate::mesh::ElementType;
use nalgebra::Vector3;

/// A Gauss point in natural coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussPoint {
    pub xi: [f64; 2],
    pub weight: f64,
}

/// 1D Gauss-Legendre points and weights on [-1, 1]
pub fn gauss_1d(n: usize) -> Vec<(f64, f64)> {
    match n {
        1 => vec![(0.0, 2.0)],
        _ => {
            let p = 1.0 / 3.0_f64.sqrt();
            vec![(-p, 1.0), (p, 1.0)]
        }
    }
}

/// Integration rule of an element type: 2 points on lines, 2×2 on quads
pub fn quadrature(element_type: ElementType) -> Vec<GaussPoint> {
    let line = gauss_1d(2);
    match element_type {
        ElementType::Line2 => line
            .iter()
            .map(|&(xi, w)| GaussPoint {
                xi: [xi, 0.0],
                weight: w,
            })
            .collect(),
        ElementType::Quad4 => {
            let mut points = Vec::with_capacity(4);
            for &(eta, we) in &line {
                for &(xi, wx) in &line {
                    points.push(GaussPoint {
                        xi: [xi, eta],
                        weight: wx * we,
                    });
                }
            }
            points
        }
    }
}

/// Shape function values and physical gradients at one point
#[derive(Debug, Clone)]
pub struct ShapeValues {
    pub n: Vec<f64>,
    /// ∂N/∂x (z component always zero)
    pub dn: Vec<Vector3<f64>>,
    pub det_j: f64,
}

/// Evaluate shape functions of `element_type` with nodal `coords` at `xi`.
///
/// A non-positive Jacobian determinant is a numerical error.
pub fn evaluate(element_type: ElementType, coords: &[[f64; 3]], xi: [f64; 2]) -> Result<ShapeValues> {
    match element_type {
        ElementType::Line2 => {
            let n = vec![0.5 * (1.0 - xi[0]), 0.5 * (1.0 + xi[0])];
            let det_j = 0.5 * (coords[1][0] - coords[0][0]);
            if det_j <= 0.0 {
                return Err(FemError::Numerical(format!(
                    "non-positive element Jacobian {det_j:.6e}"
                )));
            }
            let dndx = 0.5 / det_j;
            Ok(ShapeValues {
                n,
                dn: vec![Vector3::new(-dndx, 0.0, 0.0), Vector3::new(dndx, 0.0, 0.0)],
                det_j,
            })
        }
        ElementType::Quad4 => {
            let (x, e) = (xi[0], xi[1]);
            let n = vec![
                0.25 * (1.0 - x) * (1.0 - e),
                0.25 * (1.0 + x) * (1.0 - e),
                0.25 * (1.0 + x) * (1.0 + e),
                0.25 * (1.0 - x) * (1.0 + e),
            ];
            let dn_dxi = [
                [-0.25 * (1.0 - e), -0.25 * (1.0 - x)],
                [0.25 * (1.0 - e), -0.25 * (1.0 + x)],
                [0.25 * (1.0 + e), 0.25 * (1.0 + x)],
                [-0.25 * (1.0 + e), 0.25 * (1.0 - x)],
            ];

            // J = [dx/dξ dx/dη; dy/dξ dy/dη]
            let mut jac = [[0.0; 2]; 2];
            for (a, d) in dn_dxi.iter().enumerate() {
                for i in 0..2 {
                    for j in 0..2 {
                        jac[i][j] += coords[a][i] * d[j];
                    }
                }
            }
            let det_j = jac[0][0] * jac[1][1] - jac[0][1] * jac[1][0];
            if det_j <= 0.0 {
                return Err(FemError::Numerical(format!(
                    "non-positive element Jacobian {det_j:.6e}"
                )));
            }
            let inv = [
                [jac[1][1] / det_j, -jac[0][1] / det_j],
                [-jac[1][0] / det_j, jac[0][0] / det_j],
            ];
            let dn = dn_dxi
                .iter()
                .map(|d| {
                    Vector3::new(
                        d[0] * inv[0][0] + d[1] * inv[1][0],
                        d[0] * inv[0][1] + d[1] * inv[1][1],
                        0.0,
                    )
                })
                .collect();
            Ok(ShapeValues { n, dn, det_j })
        }
    }
}
