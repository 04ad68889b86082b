//! Per-instance transformation data for GPU rendering.
//!
//! The model is drawn with a single instance whose world matrix is rewritten
//! every frame by the spin animation. The reflected copy reuses the same
//! instance buffer; the mirror transform is applied per pass instead.

use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};

use crate::data_structures::model;

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl InstanceRaw {
    /// Packs `matrix` together with the matching normal matrix.
    ///
    /// The normal matrix is the inverse transpose of the upper 3x3 block so
    /// that non-uniform scales keep normals perpendicular to their surface.
    /// Singular matrices fall back to the plain 3x3 block.
    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        let linear = Matrix3::from_cols(
            matrix.x.truncate(),
            matrix.y.truncate(),
            matrix.z.truncate(),
        );
        let normal = linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear);
        Self {
            model: matrix.into(),
            normal: normal.into(),
        }
    }

    pub fn identity() -> Self {
        Self::from_matrix(Matrix4::identity())
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.model.into()
    }
}

/**
 * As we store vertex data directly in the GPU memory we need to tell what the bytes refer to:
 *
 * offset: zero as we want to use the full space.
 * stride: length of a vertex
 *
 * Stride layout here: the world matrix as four 4d vectors followed by the normal matrix as three 3d vectors
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // A mat4 takes up 4 vertex slots as it is technically 4 vec4s.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    // corresponds to the @location in the shader file.
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // Normal matrix as 3x3
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Vector3};

    use super::*;

    #[test]
    fn raw_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<InstanceRaw>(), (16 + 9) * 4);
    }

    #[test]
    fn rotation_keeps_its_own_normal_matrix() {
        let rotation = Matrix4::from_angle_z(Deg(30.0));
        let raw = InstanceRaw::from_matrix(rotation);
        let expected: [[f32; 3]; 3] = Matrix3::from_angle_z(Deg(30.0)).into();
        for (col, expected_col) in raw.normal.iter().zip(expected.iter()) {
            for (a, b) in col.iter().zip(expected_col.iter()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn non_uniform_scale_inverts_in_the_normal_matrix() {
        let raw = InstanceRaw::from_matrix(Matrix4::from_nonuniform_scale(2.0, 1.0, 4.0));
        assert!((raw.normal[0][0] - 0.5).abs() < 1e-6);
        assert!((raw.normal[1][1] - 1.0).abs() < 1e-6);
        assert!((raw.normal[2][2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn singular_matrices_do_not_panic() {
        let flat = Matrix4::from_nonuniform_scale(1.0, 1.0, 0.0)
            * Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let raw = InstanceRaw::from_matrix(flat);
        assert_eq!(raw.model_matrix(), flat);
    }
}
