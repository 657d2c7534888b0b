use nalgebra::{Matrix3, Vector3};

/// A Cartesian 3-vector (positions, velocities, forces, shift vectors).
pub type Vec3 = Vector3<f64>;

/// A 3x3 matrix (box vectors, virials, pressure tensors).
pub type Mat3 = Matrix3<f64>;

pub const DIM: usize = 3;

#[inline]
pub fn zero_vec() -> Vec3 {
    Vec3::zeros()
}

#[inline]
pub fn zero_mat() -> Mat3 {
    Mat3::zeros()
}
