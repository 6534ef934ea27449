//! Pose math
//!
//! Joint matrices are accumulated as weighted sums, so they are kept in the
//! 3x4 row-major layout the skinning shaders consume rather than as
//! decomposed transforms.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// 3x4 affine bone matrix (row-major storage, POD type)
///
/// Stores 3 rows of a 4x4 affine matrix. The implicit 4th row is [0, 0, 0, 1].
/// Each row stores [Xx, Xy, Xz, Tx] etc.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct BoneMatrix3x4 {
    /// First row: [m00, m01, m02, tx]
    pub row0: [f32; 4],
    /// Second row: [m10, m11, m12, ty]
    pub row1: [f32; 4],
    /// Third row: [m20, m21, m22, tz]
    pub row2: [f32; 4],
}

impl BoneMatrix3x4 {
    /// Identity bone matrix (no transformation)
    pub const IDENTITY: Self = Self {
        row0: [1.0, 0.0, 0.0, 0.0],
        row1: [0.0, 1.0, 0.0, 0.0],
        row2: [0.0, 0.0, 1.0, 0.0],
    };

    pub const ZERO: Self = Self {
        row0: [0.0; 4],
        row1: [0.0; 4],
        row2: [0.0; 4],
    };

    /// Create from row arrays
    pub const fn from_rows(row0: [f32; 4], row1: [f32; 4], row2: [f32; 4]) -> Self {
        Self { row0, row1, row2 }
    }

    /// Scale, then rotate, then translate
    pub fn from_scale_rotation_translation(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        let m = Mat4::from_scale_rotation_translation(scale, rotation, translation);
        Self {
            row0: m.row(0).to_array(),
            row1: m.row(1).to_array(),
            row2: m.row(2).to_array(),
        }
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.row0[3], self.row1[3], self.row2[3])
    }

    /// Convert to flat f32 array for GPU upload (row-major)
    pub fn to_array(&self) -> [f32; 12] {
        bytemuck::cast(*self)
    }

    /// `self += other * weight`
    pub fn add_scaled(&mut self, other: &Self, weight: f32) {
        for (row, other_row) in self.rows_mut().into_iter().zip(other.rows()) {
            for (value, other_value) in row.iter_mut().zip(other_row) {
                *value += other_value * weight;
            }
        }
    }

    /// Multiply every element by `factor`
    pub fn scale_by(&mut self, factor: f32) {
        for row in self.rows_mut() {
            for value in row.iter_mut() {
                *value *= factor;
            }
        }
    }

    /// Affine product `self * rhs` (apply `rhs` first)
    pub fn mul_affine(&self, rhs: &Self) -> Self {
        let a = self.rows();
        let b = rhs.rows();
        let mut out = [[0.0f32; 4]; 3];
        for i in 0..3 {
            for j in 0..4 {
                out[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
            out[i][3] += a[i][3];
        }
        Self::from_rows(out[0], out[1], out[2])
    }

    fn rows(&self) -> [[f32; 4]; 3] {
        [self.row0, self.row1, self.row2]
    }

    fn rows_mut(&mut self) -> [&mut [f32; 4]; 3] {
        [&mut self.row0, &mut self.row1, &mut self.row2]
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expand to a full 4x4 matrix for comparison against glam
    #[rustfmt::skip]
    fn to_mat4(m: &BoneMatrix3x4) -> Mat4 {
        Mat4::from_cols_array(&[
            m.row0[0], m.row1[0], m.row2[0], 0.0,
            m.row0[1], m.row1[1], m.row2[1], 0.0,
            m.row0[2], m.row1[2], m.row2[2], 0.0,
            m.row0[3], m.row1[3], m.row2[3], 1.0,
        ])
    }

    #[test]
    fn test_identity() {
        let m = BoneMatrix3x4::IDENTITY;
        assert_eq!(m.row0, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(m.row1, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(m.row2, [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(to_mat4(&m), Mat4::IDENTITY);
    }

    #[test]
    fn test_to_array() {
        let m = BoneMatrix3x4::from_rows(
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
        );
        assert_eq!(
            m.to_array(),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]
        );
    }

    #[test]
    fn test_from_srt_matches_glam() {
        let scale = Vec3::new(1.0, 2.0, 0.5);
        let rotation = Quat::from_rotation_y(0.7);
        let translation = Vec3::new(3.0, -1.0, 2.0);
        let m = BoneMatrix3x4::from_scale_rotation_translation(scale, rotation, translation);

        let expected = Mat4::from_scale_rotation_translation(scale, rotation, translation);
        assert!(to_mat4(&m).abs_diff_eq(expected, 1e-6));
        assert_eq!(m.translation(), translation);
    }

    #[test]
    fn test_mul_matches_mat4() {
        let a = BoneMatrix3x4::from_scale_rotation_translation(
            Vec3::ONE,
            Quat::from_rotation_z(0.3),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let b = BoneMatrix3x4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_x(-1.1),
            Vec3::new(0.0, 5.0, 1.0),
        );
        let product = a.mul_affine(&b);
        assert!(to_mat4(&product).abs_diff_eq(to_mat4(&a) * to_mat4(&b), 1e-5));
    }

    #[test]
    fn test_weighted_average() {
        let a = BoneMatrix3x4::from_scale_rotation_translation(Vec3::ONE, Quat::IDENTITY, Vec3::X);
        let b = BoneMatrix3x4::from_scale_rotation_translation(Vec3::ONE, Quat::IDENTITY, Vec3::Y);

        let mut sum = BoneMatrix3x4::ZERO;
        sum.add_scaled(&a, 0.25);
        sum.add_scaled(&b, 0.25);
        sum.scale_by(1.0 / 0.5);

        assert!(sum.translation().abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-6));
        assert_eq!(sum.row0[0], 1.0);
    }

    #[test]
    fn test_aabb_union() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::new(0.5, 2.0, 0.5));
        let u = a.union(&b);
        assert_eq!(u, Aabb::new(Vec3::splat(-1.0), Vec3::new(1.0, 2.0, 1.0)));
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.contains(&u));
    }
}
