//! Global sparse system with a fixed sparsity pattern.
//!
//! The CSR pattern is derived once from the element connectivity and the
//! DofMap; afterwards only values change. Every diagonal entry is part of the
//! pattern so constrained rows can always be replaced by identity rows.

use crate::dof_map::DofMap;
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeSet;

/// Jacobian (CSR) and residual of the global nonlinear system
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    /// Global Jacobian ∂R/∂U
    pub jacobian: CsrMatrix<f64>,
    /// Global residual R = F_int − F_ext
    pub residual: DVector<f64>,
}

impl GlobalSystem {
    /// Build the pattern from the coupling of element dofs.
    pub fn new(mesh: &Mesh, dof_map: &DofMap) -> Result<Self> {
        let n = dof_map.total_dofs();
        let mut rows: Vec<BTreeSet<usize>> = (0..n).map(|i| BTreeSet::from([i])).collect();
        for element in &mesh.elements {
            let dofs = dof_map.element_dofs(element)?;
            for &i in &dofs {
                rows[i].extend(dofs.iter().copied());
            }
        }

        let mut row_offsets = Vec::with_capacity(n + 1);
        let mut col_indices = Vec::new();
        row_offsets.push(0);
        for row in &rows {
            col_indices.extend(row.iter().copied());
            row_offsets.push(col_indices.len());
        }
        let values = vec![0.0; col_indices.len()];
        let jacobian = CsrMatrix::try_from_csr_data(n, n, row_offsets, col_indices, values)
            .map_err(|e| FemError::Config(format!("failed to build sparsity pattern: {e}")))?;

        log::debug!("sparsity pattern: {} dofs, {} non-zeros", n, jacobian.nnz());

        Ok(Self {
            jacobian,
            residual: DVector::zeros(n),
        })
    }

    pub fn num_dofs(&self) -> usize {
        self.residual.len()
    }

    pub fn nnz(&self) -> usize {
        self.jacobian.nnz()
    }

    /// Zero values, keep the pattern
    pub fn reset(&mut self) {
        self.residual.fill(0.0);
        self.jacobian.values_mut().fill(0.0);
    }

    /// Scatter-add a local residual and, if given, a local Jacobian.
    pub fn add_local(
        &mut self,
        dofs: &[usize],
        residual: &DVector<f64>,
        jacobian: Option<&DMatrix<f64>>,
    ) -> Result<()> {
        for (i, &gi) in dofs.iter().enumerate() {
            self.residual[gi] += residual[i];
        }
        let Some(local) = jacobian else {
            return Ok(());
        };
        let (offsets, cols, values) = self.jacobian.csr_data_mut();
        for (i, &gi) in dofs.iter().enumerate() {
            let row_cols = &cols[offsets[gi]..offsets[gi + 1]];
            for (j, &gj) in dofs.iter().enumerate() {
                let pos = row_cols.binary_search(&gj).map_err(|_| {
                    FemError::Numerical(format!("entry ({gi}, {gj}) is outside the sparsity pattern"))
                })?;
                values[offsets[gi] + pos] += local[(i, j)];
            }
        }
        Ok(())
    }

    /// Replace row `dof` by an identity row with zero residual
    pub fn set_identity_row(&mut self, dof: usize) {
        self.residual[dof] = 0.0;
        let (offsets, cols, values) = self.jacobian.csr_data_mut();
        for k in offsets[dof]..offsets[dof + 1] {
            values[k] = if cols[k] == dof { 1.0 } else { 0.0 };
        }
    }

    /// Dense copy of the Jacobian
    pub fn dense_jacobian(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.num_dofs(), self.num_dofs());
        for (i, j, v) in self.jacobian.triplet_iter() {
            dense[(i, j)] += *v;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ElementBlock, KernelKind};
    use crate::materials::{MaterialKind, MaterialModel, MaterialParams};

    fn bar_system(n: usize) -> (Mesh, DofMap, GlobalSystem) {
        let mesh = Mesh::line(n, 1.0);
        let material = MaterialModel::new(
            MaterialKind::LinearElastic,
            &MaterialParams::from_pairs(&[("E", 1.0), ("nu", 0.0)]),
        )
        .unwrap();
        let blocks = [ElementBlock::new("bar", KernelKind::Bar, material, 1.0)];
        let map = DofMap::build(&mesh, &blocks).unwrap();
        let system = GlobalSystem::new(&mesh, &map).unwrap();
        (mesh, map, system)
    }

    #[test]
    fn tridiagonal_pattern_for_a_bar() {
        let (_, _, system) = bar_system(3);
        assert_eq!(system.num_dofs(), 4);
        assert_eq!(system.nnz(), 4 + 2 * 3);
    }

    #[test]
    fn scatter_and_identity_rows() {
        let (_, _, mut system) = bar_system(2);
        let k = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
        let r = DVector::from_vec(vec![0.5, -0.5]);
        system.add_local(&[0, 1], &r, Some(&k)).unwrap();
        system.add_local(&[1, 2], &r, Some(&k)).unwrap();
        let dense = system.dense_jacobian();
        assert_eq!(dense[(1, 1)], 2.0);
        assert_eq!(system.residual[1], 0.0);

        system.set_identity_row(0);
        let dense = system.dense_jacobian();
        assert_eq!(dense[(0, 0)], 1.0);
        assert_eq!(dense[(0, 1)], 0.0);
        assert_eq!(dense[(1, 0)], -1.0);

        system.reset();
        assert_eq!(system.dense_jacobian().norm(), 0.0);
    }

    #[test]
    fn entries_outside_pattern_are_rejected() {
        let (_, _, mut system) = bar_system(2);
        let k = DMatrix::from_element(2, 2, 1.0);
        let r = DVector::zeros(2);
        assert!(system.add_local(&[0, 2], &r, Some(&k)).is_err());
    }
}
