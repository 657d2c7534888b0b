use crate::core::models::geometry::{Mat3, Vec3};

/// Periodic image displacements for every combination of `-1..=1` box vectors.
///
/// Box rows are the box vectors. Index `(dx + 1) * 9 + (dy + 1) * 3 + (dz + 1)`
/// holds `dx * a + dy * b + dz * c`, so [`ShiftTable::CENTRAL`] is the zero shift.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftTable {
    vectors: Vec<Vec3>,
}

impl ShiftTable {
    pub const LEN: usize = 27;
    pub const CENTRAL: usize = 13;

    pub fn from_box(box_matrix: &Mat3) -> Self {
        let mut vectors = Vec::with_capacity(Self::LEN);
        for dx in -1i32..=1 {
            for dy in -1i32..=1 {
                for dz in -1i32..=1 {
                    let d = Vec3::new(dx as f64, dy as f64, dz as f64);
                    vectors.push(box_matrix.transpose() * d);
                }
            }
        }
        Self { vectors }
    }

    pub fn index_of(dx: i32, dy: i32, dz: i32) -> Option<usize> {
        let in_range = |d: i32| (-1..=1).contains(&d);
        if !(in_range(dx) && in_range(dy) && in_range(dz)) {
            return None;
        }
        Some(((dx + 1) * 9 + (dy + 1) * 3 + (dz + 1)) as usize)
    }

    pub fn vectors(&self) -> &[Vec3] {
        &self.vectors
    }

    pub fn get(&self, index: usize) -> Option<&Vec3> {
        self.vectors.get(index)
    }
}
