//! Per-bin uniforms: scene root, reflection and clip plane.

use cgmath::{Matrix4, SquareMatrix, Vector4};
use wgpu::util::DeviceExt;

use crate::{mirror::MirrorLayout, pipelines::state::PassState};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BinStateUniform {
    root: [[f32; 4]; 4],
    mirror: [[f32; 4]; 4],
    clip_plane: [f32; 4],
    // x: clipping enabled, yzw unused
    options: [f32; 4],
}

impl BinStateUniform {
    pub fn new(pass: &PassState, layout: &MirrorLayout) -> Self {
        let mirror = if pass.reflected {
            layout.reflection
        } else {
            Matrix4::identity()
        };
        let (clip_plane, clip) = if pass.clip {
            (layout.plane.clip_plane(), 1.0)
        } else {
            (Vector4::new(0.0, 0.0, 0.0, 0.0), 0.0)
        };
        Self {
            root: layout.root.into(),
            mirror: mirror.into(),
            clip_plane: clip_plane.into(),
            options: [clip, 0.0, 0.0, 0.0],
        }
    }

    pub fn clips(&self) -> bool {
        self.options[0] > 0.5
    }

    pub fn mirror(&self) -> Matrix4<f32> {
        self.mirror.into()
    }
}

/// Uniform buffer and bind group of one render bin.
pub struct BinStateResources {
    pub uniform: BinStateUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl BinStateResources {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform: BinStateUniform,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        });
        Self {
            uniform,
            buffer,
            bind_group,
        }
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("bin_state_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::{
        config::Settings, data_structures::bounds::BoundingSphere, pipelines::state::mirror_passes,
    };

    fn layout() -> MirrorLayout {
        MirrorLayout::new(
            BoundingSphere::new(Point3::new(0.0, 0.0, 1.0), 2.0),
            &Settings::default(),
        )
    }

    #[test]
    fn matches_the_shader_layout() {
        assert_eq!(std::mem::size_of::<BinStateUniform>(), 160);
    }

    #[test]
    fn only_the_reflected_bin_mirrors_and_clips() {
        let layout = layout();
        for pass in mirror_passes() {
            let uniform = BinStateUniform::new(&pass, &layout);
            assert_eq!(uniform.clips(), pass.bin == 4);
            if pass.bin == 4 {
                assert_eq!(uniform.mirror(), layout.reflection);
                assert_eq!(uniform.clip_plane, [0.0, 0.0, -1.0, layout.plane.z]);
            } else {
                assert_eq!(uniform.mirror(), Matrix4::identity());
            }
            let root: [[f32; 4]; 4] = layout.root.into();
            assert_eq!(uniform.root, root);
        }
    }
}
