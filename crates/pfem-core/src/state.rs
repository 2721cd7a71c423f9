//! Quadrature-point history and its double buffer.
//!
//! Every quadrature point owns a [`QpState`]: a name → value map of history
//! variables (plastic strain, equivalent plastic strain, fracture driving
//! energy, ...). The [`HistoryBuffer`] keeps two snapshots of all of them:
//! `old` is the last converged step and is read-only while Newton iterates,
//! `new` receives trial values. `old := new` happens only in [`HistoryBuffer::commit`].

use crate::error::{FemError, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single history variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryValue {
    Scalar(f64),
    Vector(Vector3<f64>),
    Tensor(Matrix3<f64>),
}

/// History variables of one quadrature point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QpState(pub BTreeMap<String, HistoryValue>);

impl QpState {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Scalar value by name, if present
    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(HistoryValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    /// Tensor value by name, if present
    pub fn tensor(&self, name: &str) -> Option<Matrix3<f64>> {
        match self.0.get(name) {
            Some(HistoryValue::Tensor(t)) => Some(*t),
            _ => None,
        }
    }

    /// Vector value by name, if present
    pub fn vector(&self, name: &str) -> Option<Vector3<f64>> {
        match self.0.get(name) {
            Some(HistoryValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn set_scalar(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), HistoryValue::Scalar(value));
    }

    pub fn set_tensor(&mut self, name: &str, value: Matrix3<f64>) {
        self.0.insert(name.to_string(), HistoryValue::Tensor(value));
    }

    pub fn set_vector(&mut self, name: &str, value: Vector3<f64>) {
        self.0.insert(name.to_string(), HistoryValue::Vector(value));
    }

    /// Iterate over the scalar entries in name order
    pub fn scalars(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().filter_map(|(k, v)| match v {
            HistoryValue::Scalar(s) => Some((k.as_str(), *s)),
            _ => None,
        })
    }
}

/// Global double-buffered history storage.
///
/// States are stored flat; `offsets[e]..offsets[e + 1]` are the quadrature
/// points of element `e`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryBuffer {
    old: Vec<QpState>,
    new: Vec<QpState>,
    offsets: Vec<usize>,
}

impl HistoryBuffer {
    /// Allocate empty states for elements with the given quadrature point counts
    pub fn with_layout(points_per_element: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(points_per_element.len() + 1);
        offsets.push(0);
        for &n in points_per_element {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + n);
        }
        let total = offsets[offsets.len() - 1];
        Self {
            old: vec![QpState::new(); total],
            new: vec![QpState::new(); total],
            offsets,
        }
    }

    pub fn num_elements(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn num_points(&self) -> usize {
        self.old.len()
    }

    /// Committed states of element `e`
    pub fn old(&self, e: usize) -> &[QpState] {
        &self.old[self.offsets[e]..self.offsets[e + 1]]
    }

    /// Trial states of element `e`
    pub fn new_states(&self, e: usize) -> &[QpState] {
        &self.new[self.offsets[e]..self.offsets[e + 1]]
    }

    /// Overwrite the trial states of element `e`
    pub fn store_new(&mut self, e: usize, states: Vec<QpState>) {
        let range = self.offsets[e]..self.offsets[e + 1];
        debug_assert_eq!(range.len(), states.len());
        for (slot, state) in self.new[range].iter_mut().zip(states) {
            *slot = state;
        }
    }

    /// Set both snapshots of element `e` (initial state)
    pub fn seed(&mut self, e: usize, states: Vec<QpState>) {
        self.store_new(e, states);
        let range = self.offsets[e]..self.offsets[e + 1];
        self.old[range.clone()].clone_from_slice(&self.new[range]);
    }

    /// `old := new`
    pub fn commit(&mut self) {
        self.old.clone_from(&self.new);
    }

    /// Discard trial states, `new := old`
    pub fn rollback(&mut self) {
        self.new.clone_from(&self.old);
    }

    /// All committed states, flat
    pub fn all_old(&self) -> &[QpState] {
        &self.old
    }

    /// Replace the committed states (checkpoint restore); both snapshots are set.
    pub fn restore(&mut self, states: Vec<QpState>) -> Result<()> {
        if states.len() != self.old.len() {
            return Err(FemError::Config(format!(
                "history has {} quadrature points but checkpoint holds {}",
                self.old.len(),
                states.len()
            )));
        }
        self.new = states.clone();
        self.old = states;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let mut s = QpState::new();
        s.set_scalar("eqp", 0.25);
        s.set_tensor("plastic_strain", Matrix3::identity());
        assert_eq!(s.scalar("eqp"), Some(0.25));
        assert_eq!(s.scalar("plastic_strain"), None);
        assert_eq!(s.tensor("plastic_strain"), Some(Matrix3::identity()));
        let names: Vec<_> = s.scalars().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["eqp"]);
    }

    #[test]
    fn buffer_layout_and_commit() {
        let mut buf = HistoryBuffer::with_layout(&[2, 4]);
        assert_eq!(buf.num_elements(), 2);
        assert_eq!(buf.num_points(), 6);
        assert_eq!(buf.old(1).len(), 4);

        let mut s = QpState::new();
        s.set_scalar("hist", 1.0);
        buf.store_new(0, vec![s.clone(), s.clone()]);
        assert!(buf.old(0)[0].is_empty());

        buf.commit();
        assert_eq!(buf.old(0)[1].scalar("hist"), Some(1.0));

        let mut t = QpState::new();
        t.set_scalar("hist", 5.0);
        buf.store_new(0, vec![t.clone(), t]);
        buf.rollback();
        assert_eq!(buf.new_states(0)[0].scalar("hist"), Some(1.0));
    }

    #[test]
    fn restore_checks_size() {
        let mut buf = HistoryBuffer::with_layout(&[1]);
        assert!(buf.restore(vec![QpState::new(); 3]).is_err());
        assert!(buf.restore(vec![QpState::new()]).is_ok());
    }
}
