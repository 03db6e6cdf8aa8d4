//! 12-float affine matrix encoding used by the instance buffer.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// A 4x4 affine transform with the constant `(0, 0, 0, 1)` row dropped.
///
/// Stored column by column: `[m00, m10, m20, m01, m11, m21, m02, m12, m22,
/// m03, m13, m23]`. 48 bytes per matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PackedMatrix {
    /// The four columns, three rows each.
    pub columns: [[f32; 3]; 4],
}

impl PackedMatrix {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Packs the upper three rows of an affine matrix.
    #[must_use]
    pub fn from_mat4(m: &Mat4) -> Self {
        Self {
            columns: [
                m.x_axis.truncate().to_array(),
                m.y_axis.truncate().to_array(),
                m.z_axis.truncate().to_array(),
                m.w_axis.truncate().to_array(),
            ],
        }
    }

    /// Rebuilds the full affine matrix.
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        let [c0, c1, c2, c3] = self.columns;
        Mat4::from_cols(
            Vec4::new(c0[0], c0[1], c0[2], 0.0),
            Vec4::new(c1[0], c1[1], c1[2], 0.0),
            Vec4::new(c2[0], c2[1], c2[2], 0.0),
            Vec4::new(c3[0], c3[1], c3[2], 1.0),
        )
    }
}

impl From<Mat4> for PackedMatrix {
    fn from(m: Mat4) -> Self {
        Self::from_mat4(&m)
    }
}

/// Packs a slice of matrices.
#[must_use]
pub fn pack_matrices(matrices: &[Mat4]) -> Vec<PackedMatrix> {
    matrices.iter().map(PackedMatrix::from_mat4).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_packed_matrix_size() {
        assert_eq!(PackedMatrix::SIZE, 48);
    }

    #[test]
    fn test_field_order() {
        let m = Mat4::from_cols_array_2d(&[
            [1.0, 2.0, 3.0, 0.0],
            [4.0, 5.0, 6.0, 0.0],
            [7.0, 8.0, 9.0, 0.0],
            [10.0, 11.0, 12.0, 1.0],
        ]);
        let packed = PackedMatrix::from_mat4(&m);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&packed));
        assert_eq!(
            floats,
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]
        );
    }

    #[test]
    fn test_translation_round_trip_is_bit_identical() {
        let m = Mat4::from_translation(Vec3::new(12.5, -0.75, 1024.125));
        let back = PackedMatrix::from_mat4(&m).to_mat4();
        assert_eq!(back.to_cols_array(), m.to_cols_array());
    }

    #[test]
    fn test_affine_round_trip_keeps_upper_rows() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 2.5, 1.0),
            Quat::from_rotation_y(0.7),
            Vec3::new(3.0, 0.0, -9.0),
        );
        let back = PackedMatrix::from_mat4(&m).to_mat4();
        for row in 0..3 {
            assert_eq!(back.row(row), m.row(row));
        }
        assert_eq!(back.row(3), Vec4::W);
    }
}
