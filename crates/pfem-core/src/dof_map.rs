//! Degree-of-freedom numbering.
//!
//! Every `(node, field component)` pair that some element activates gets one
//! global index. Numbering is node-major: all components of node 0 first, in
//! global field order, then node 1, and so on. Global field order is the order
//! of first appearance across the element blocks.

use crate::elements::ElementBlock;
use crate::error::{FemError, Result};
use crate::mesh::{Element, Mesh};

/// Bijection between `(node, field)` pairs and `[0, total_dofs)`
#[derive(Debug, Clone, PartialEq)]
pub struct DofMap {
    field_names: Vec<String>,
    /// Per node: `(global field index, dof)` sorted by field index
    node_dofs: Vec<Vec<(usize, usize)>>,
    /// Per block: global field index of each block field
    block_fields: Vec<Vec<usize>>,
    total: usize,
}

impl DofMap {
    /// Number the unknowns of `mesh` given its element blocks.
    pub fn build(mesh: &Mesh, blocks: &[ElementBlock]) -> Result<Self> {
        let mut field_names: Vec<String> = Vec::new();
        let mut block_fields = Vec::with_capacity(blocks.len());
        for block in blocks {
            let mut indices = Vec::with_capacity(block.fields.len());
            for field in &block.fields {
                let index = match field_names.iter().position(|f| f == field) {
                    Some(i) => i,
                    None => {
                        field_names.push(field.clone());
                        field_names.len() - 1
                    }
                };
                indices.push(index);
            }
            block_fields.push(indices);
        }

        let mut active = vec![Vec::<usize>::new(); mesh.nodes.len()];
        for element in &mesh.elements {
            element.validate()?;
            let fields = block_fields.get(element.block).ok_or_else(|| {
                FemError::Config(format!(
                    "element {} references unknown block {}",
                    element.id, element.block
                ))
            })?;
            for &node in &element.nodes {
                let slot = active.get_mut(node).ok_or_else(|| {
                    FemError::Config(format!(
                        "element {} references non-existent node {}",
                        element.id, node
                    ))
                })?;
                for &f in fields {
                    if !slot.contains(&f) {
                        slot.push(f);
                    }
                }
            }
        }

        let mut node_dofs = Vec::with_capacity(active.len());
        let mut next = 0;
        for (node, mut fields) in active.into_iter().enumerate() {
            if fields.is_empty() {
                return Err(FemError::Config(format!(
                    "node {node} has no active field in any element"
                )));
            }
            fields.sort_unstable();
            let dofs = fields
                .into_iter()
                .map(|f| {
                    let dof = next;
                    next += 1;
                    (f, dof)
                })
                .collect();
            node_dofs.push(dofs);
        }

        log::debug!(
            "numbered {} dofs on {} nodes, fields {:?}",
            next,
            node_dofs.len(),
            field_names
        );

        Ok(Self {
            field_names,
            node_dofs,
            block_fields,
            total: next,
        })
    }

    pub fn total_dofs(&self) -> usize {
        self.total
    }

    pub fn num_nodes(&self) -> usize {
        self.node_dofs.len()
    }

    /// Global field names in numbering order
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.field_names.iter().position(|f| f == field)
    }

    /// Dof of `field` at `node`, if that pair is active
    pub fn dof(&self, node: usize, field: &str) -> Option<usize> {
        let f = self.field_index(field)?;
        self.dof_by_index(node, f)
    }

    fn dof_by_index(&self, node: usize, field: usize) -> Option<usize> {
        let dofs = self.node_dofs.get(node)?;
        dofs.binary_search_by_key(&field, |&(f, _)| f)
            .ok()
            .map(|i| dofs[i].1)
    }

    /// Names of the fields active at `node`
    pub fn node_fields(&self, node: usize) -> Vec<&str> {
        self.node_dofs
            .get(node)
            .map(|dofs| {
                dofs.iter()
                    .map(|&(f, _)| self.field_names[f].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Dofs of an element, node-major in its block's field order
    pub fn element_dofs(&self, element: &Element) -> Result<Vec<usize>> {
        let fields = self.block_fields.get(element.block).ok_or_else(|| {
            FemError::Config(format!(
                "element {} references unknown block {}",
                element.id, element.block
            ))
        })?;
        let mut dofs = Vec::with_capacity(element.nodes.len() * fields.len());
        for &node in &element.nodes {
            for &f in fields {
                let dof = self.dof_by_index(node, f).ok_or_else(|| {
                    FemError::Config(format!(
                        "element {}: field '{}' is not active at node {}",
                        element.id, self.field_names[f], node
                    ))
                })?;
                dofs.push(dof);
            }
        }
        Ok(dofs)
    }
}
