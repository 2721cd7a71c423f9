//! Second- and fourth-order tensor helpers.
//!
//! Fourth-order tensors are stored as 9×9 matrices with the index pair
//! `(i, j)` flattened to `3 * i + j`, so `C[(idx(i, j), idx(k, l))] = C_ijkl`.

use nalgebra::{Matrix3, SMatrix};

/// Fourth-order tensor in flattened 9×9 form
pub type Tangent = SMatrix<f64, 9, 9>;

/// Flattened position of the index pair `(i, j)`
#[inline]
pub fn idx(i: usize, j: usize) -> usize {
    3 * i + j
}

fn delta(i: usize, j: usize) -> f64 {
    if i == j { 1.0 } else { 0.0 }
}

/// `I ⊗ I`
pub fn identity_outer() -> Tangent {
    let mut t = Tangent::zeros();
    for i in 0..3 {
        for k in 0..3 {
            t[(idx(i, i), idx(k, k))] = 1.0;
        }
    }
    t
}

/// Symmetric fourth-order identity `½(δik δjl + δil δjk)`
pub fn symmetric_identity() -> Tangent {
    let mut t = Tangent::zeros();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                for l in 0..3 {
                    t[(idx(i, j), idx(k, l))] =
                        0.5 * (delta(i, k) * delta(j, l) + delta(i, l) * delta(j, k));
                }
            }
        }
    }
    t
}

/// Deviatoric projector on symmetric tensors, `Isym − ⅓ I ⊗ I`
pub fn deviatoric_projector() -> Tangent {
    symmetric_identity() - identity_outer() / 3.0
}

/// `A ⊗ B`
pub fn outer(a: &Matrix3<f64>, b: &Matrix3<f64>) -> Tangent {
    let mut t = Tangent::zeros();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                for l in 0..3 {
                    t[(idx(i, j), idx(k, l))] = a[(i, j)] * b[(k, l)];
                }
            }
        }
    }
    t
}

/// Double contraction `C : A`
pub fn contract(c: &Tangent, a: &Matrix3<f64>) -> Matrix3<f64> {
    let mut out = Matrix3::zeros();
    for i in 0..3 {
        for j in 0..3 {
            let mut sum = 0.0;
            for k in 0..3 {
                for l in 0..3 {
                    sum += c[(idx(i, j), idx(k, l))] * a[(k, l)];
                }
            }
            out[(i, j)] = sum;
        }
    }
    out
}

/// Symmetric part
pub fn sym(a: &Matrix3<f64>) -> Matrix3<f64> {
    (a + a.transpose()) * 0.5
}

/// Deviatoric part
pub fn deviator(a: &Matrix3<f64>) -> Matrix3<f64> {
    a - Matrix3::identity() * (a.trace() / 3.0)
}

/// Von Mises equivalent of a stress tensor
pub fn von_mises(stress: &Matrix3<f64>) -> f64 {
    let s = deviator(stress);
    (1.5 * s.dot(&s)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projector_kills_spherical_part() {
        let p = deviatoric_projector();
        let dev = contract(&p, &(Matrix3::identity() * 2.0));
        assert!(dev.norm() < 1e-14);

        let a = Matrix3::new(1.0, 2.0, 0.0, 2.0, -1.0, 0.5, 0.0, 0.5, 3.0);
        let expected = deviator(&a);
        assert!((contract(&p, &a) - expected).norm() < 1e-14);
    }

    #[test]
    fn von_mises_of_uniaxial_stress() {
        let s = Matrix3::new(100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!((von_mises(&s) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn outer_product_layout() {
        let a = Matrix3::identity();
        let mut b = Matrix3::zeros();
        b[(0, 1)] = 2.0;
        let t = outer(&a, &b);
        assert_eq!(t[(idx(1, 1), idx(0, 1))], 2.0);
        assert_eq!(t[(idx(0, 1), idx(0, 1))], 0.0);
    }
}
