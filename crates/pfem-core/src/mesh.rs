//! Mesh data structures for finite element analysis.
//!
//! Nodes and elements are stored in contiguous vectors and addressed by their
//! 0-based position, which keeps every loop over the mesh deterministic. Each
//! element carries the index of the element block that selects its kernel,
//! material and active fields.

use crate::error::{FemError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node index (0-based)
    pub id: usize,
    /// Coordinates (unused components are zero)
    pub coords: [f64; 3],
}

impl Node {
    /// Create a new node
    pub fn new(id: usize, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            coords: [x, y, z],
        }
    }

    pub fn x(&self) -> f64 {
        self.coords[0]
    }

    pub fn y(&self) -> f64 {
        self.coords[1]
    }
}

/// Element type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 2-node line element
    Line2,
    /// 4-node bilinear quadrilateral
    Quad4,
}

impl ElementType {
    /// Number of nodes for this element type
    pub fn num_nodes(&self) -> usize {
        match self {
            ElementType::Line2 => 2,
            ElementType::Quad4 => 4,
        }
    }

    /// Parametric dimension
    pub fn dim(&self) -> usize {
        match self {
            ElementType::Line2 => 1,
            ElementType::Quad4 => 2,
        }
    }

    /// VTK cell type code
    pub fn vtk_cell_type(&self) -> u8 {
        match self {
            ElementType::Line2 => 3,
            ElementType::Quad4 => 9,
        }
    }
}

/// An element in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element index (0-based)
    pub id: usize,
    /// Element block index
    pub block: usize,
    /// Element type
    pub element_type: ElementType,
    /// Node connectivity (node indices)
    pub nodes: Vec<usize>,
}

impl Element {
    /// Create a new element
    pub fn new(id: usize, block: usize, element_type: ElementType, nodes: Vec<usize>) -> Self {
        Self {
            id,
            block,
            element_type,
            nodes,
        }
    }

    /// Validate that the element has the correct number of nodes
    pub fn validate(&self) -> Result<()> {
        let expected = self.element_type.num_nodes();
        let actual = self.nodes.len();
        if actual != expected {
            return Err(FemError::Config(format!(
                "element {} of type {:?} has {} nodes but expected {}",
                self.id, self.element_type, actual, expected
            )));
        }
        Ok(())
    }
}

/// Complete finite element mesh
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Spatial dimension (1 or 2)
    pub dim: usize,
    /// All nodes, indexed by node id
    pub nodes: Vec<Node>,
    /// All elements, indexed by element id
    pub elements: Vec<Element>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            nodes: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Structured mesh of `n` Line2 elements on `[0, length]`, all in block 0.
    pub fn line(n: usize, length: f64) -> Self {
        let mut mesh = Self::new(1);
        for i in 0..=n {
            mesh.add_node(length * i as f64 / n as f64, 0.0);
        }
        for e in 0..n {
            mesh.elements
                .push(Element::new(e, 0, ElementType::Line2, vec![e, e + 1]));
        }
        mesh
    }

    /// Structured `nx × ny` Quad4 mesh on `[0, lx] × [0, ly]`, all in block 0.
    ///
    /// Node `(i, j)` has index `j * (nx + 1) + i`; element connectivity is
    /// counter-clockwise.
    pub fn rectangle(nx: usize, ny: usize, lx: f64, ly: f64) -> Self {
        let mut mesh = Self::new(2);
        for j in 0..=ny {
            for i in 0..=nx {
                mesh.add_node(lx * i as f64 / nx as f64, ly * j as f64 / ny as f64);
            }
        }
        for j in 0..ny {
            for i in 0..nx {
                let n0 = j * (nx + 1) + i;
                let id = mesh.elements.len();
                mesh.elements.push(Element::new(
                    id,
                    0,
                    ElementType::Quad4,
                    vec![n0, n0 + 1, n0 + nx + 2, n0 + nx + 1],
                ));
            }
        }
        mesh
    }

    /// Append a node and return its index
    pub fn add_node(&mut self, x: f64, y: f64) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, x, y, 0.0));
        id
    }

    /// Append an element and return its index
    pub fn add_element(
        &mut self,
        block: usize,
        element_type: ElementType,
        nodes: Vec<usize>,
    ) -> Result<usize> {
        let id = self.elements.len();
        let element = Element::new(id, block, element_type, nodes);
        element.validate()?;
        if let Some(&bad) = element.nodes.iter().find(|&&n| n >= self.nodes.len()) {
            return Err(FemError::Config(format!(
                "element {id} references non-existent node {bad}"
            )));
        }
        self.elements.push(element);
        Ok(id)
    }

    /// Number of nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Coordinates of the nodes of an element, in connectivity order
    pub fn element_coords(&self, element: &Element) -> Vec<[f64; 3]> {
        element
            .nodes
            .iter()
            .map(|&n| self.nodes[n].coords)
            .collect()
    }

    /// Indices of the nodes whose coordinates satisfy `predicate`
    pub fn nodes_where<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&[f64; 3]) -> bool,
    {
        self.nodes
            .iter()
            .filter(|n| predicate(&n.coords))
            .map(|n| n.id)
            .collect()
    }

    /// Quad4 edges owned by a single element, oriented counter-clockwise as
    /// in that element.
    pub fn boundary_edges(&self) -> Vec<[usize; 2]> {
        let mut owners: BTreeMap<[usize; 2], usize> = BTreeMap::new();
        let mut edges = Vec::new();
        for element in &self.elements {
            if element.element_type != ElementType::Quad4 {
                continue;
            }
            let n = &element.nodes;
            for k in 0..4 {
                let (a, b) = (n[k], n[(k + 1) % 4]);
                *owners.entry([a.min(b), a.max(b)]).or_insert(0) += 1;
                edges.push([a, b]);
            }
        }
        edges.retain(|&[a, b]| owners.get(&[a.min(b), a.max(b)]) == Some(&1));
        edges
    }

    /// Reassign every element satisfying `predicate` (evaluated on the element
    /// centroid) to `block`.
    pub fn assign_block<F>(&mut self, block: usize, predicate: F)
    where
        F: Fn(&[f64; 3]) -> bool,
    {
        for element in &mut self.elements {
            let mut centroid = [0.0; 3];
            for &n in &element.nodes {
                for (c, x) in centroid.iter_mut().zip(self.nodes[n].coords) {
                    *c += x / element.nodes.len() as f64;
                }
            }
            if predicate(&centroid) {
                element.block = block;
            }
        }
    }

    /// Validate the mesh
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.dim > 2 {
            return Err(FemError::Config(format!(
                "unsupported spatial dimension {}",
                self.dim
            )));
        }
        for element in &self.elements {
            element.validate()?;
            if element.element_type.dim() != self.dim {
                return Err(FemError::Config(format!(
                    "element {} of type {:?} does not match mesh dimension {}",
                    element.id, element.element_type, self.dim
                )));
            }
            for &node_id in &element.nodes {
                if node_id >= self.nodes.len() {
                    return Err(FemError::Config(format!(
                        "element {} references non-existent node {}",
                        element.id, node_id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_num_nodes() {
        assert_eq!(ElementType::Line2.num_nodes(), 2);
        assert_eq!(ElementType::Quad4.num_nodes(), 4);
        assert_eq!(ElementType::Quad4.dim(), 2);
    }

    #[test]
    fn element_validation() {
        let elem = Element::new(0, 0, ElementType::Quad4, vec![0, 1, 2, 3]);
        assert!(elem.validate().is_ok());

        let bad_elem = Element::new(1, 0, ElementType::Quad4, vec![0, 1, 2]);
        assert!(bad_elem.validate().is_err());
    }

    #[test]
    fn line_mesh_layout() {
        let mesh = Mesh::line(4, 2.0);
        assert_eq!(mesh.num_nodes(), 5);
        assert_eq!(mesh.elements.len(), 4);
        assert!((mesh.nodes[4].x() - 2.0).abs() < 1e-14);
        assert_eq!(mesh.elements[3].nodes, vec![3, 4]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn rectangle_mesh_is_counter_clockwise() {
        let mesh = Mesh::rectangle(2, 1, 2.0, 1.0);
        assert_eq!(mesh.num_nodes(), 6);
        assert_eq!(mesh.elements.len(), 2);
        assert_eq!(mesh.elements[1].nodes, vec![1, 2, 5, 4]);
        let c = mesh.element_coords(&mesh.elements[0]);
        // signed area of the first quad is positive
        let area = 0.5
            * ((c[0][0] * c[1][1] - c[1][0] * c[0][1])
                + (c[1][0] * c[2][1] - c[2][0] * c[1][1])
                + (c[2][0] * c[3][1] - c[3][0] * c[2][1])
                + (c[3][0] * c[0][1] - c[0][0] * c[3][1]));
        assert!((area - 1.0).abs() < 1e-14);
    }

    #[test]
    fn add_element_rejects_missing_node() {
        let mut mesh = Mesh::new(1);
        mesh.add_node(0.0, 0.0);
        mesh.add_node(1.0, 0.0);
        assert!(mesh.add_element(0, ElementType::Line2, vec![0, 1]).is_ok());
        let err = mesh.add_element(0, ElementType::Line2, vec![1, 3]).unwrap_err();
        assert!(err.to_string().contains("non-existent node 3"));
    }

    #[test]
    fn node_sets_and_block_assignment() {
        let mut mesh = Mesh::rectangle(4, 1, 4.0, 1.0);
        let left = mesh.nodes_where(|x| x[0].abs() < 1e-12);
        assert_eq!(left, vec![0, 5]);

        mesh.assign_block(1, |c| c[0] > 2.0);
        let blocks: Vec<_> = mesh.elements.iter().map(|e| e.block).collect();
        assert_eq!(blocks, vec![0, 0, 1, 1]);
    }

    #[test]
    fn boundary_edges_skip_shared_sides() {
        let mesh = Mesh::rectangle(2, 1, 2.0, 1.0);
        let edges = mesh.boundary_edges();
        // the side 1-4 between the two quads is interior
        assert_eq!(edges, vec![[0, 1], [4, 3], [3, 0], [1, 2], [2, 5], [5, 4]]);
        assert!(Mesh::line(3, 1.0).boundary_edges().is_empty());
    }
}
