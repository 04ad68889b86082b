//! Meshes, materials and models.
//!
//! Loading produces CPU-side [`ModelData`] first. Bounds and the mirror layout
//! are computed from that, then [`Model::upload`] turns it into GPU buffers
//! and bind groups.

use std::ops::Range;

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, Point3, SquareMatrix, Transform, Vector3};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::data_structures::{bounds::BoundingSphere, texture::Texture};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Triangle list geometry as it comes out of a file.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    /// Index into [`ModelData::materials`], if the mesh has one.
    pub material: Option<usize>,
    /// Node transform still to be applied to the vertices.
    pub transform: Option<Matrix4<f32>>,
}

impl MeshData {
    /// Applies the pending transform to positions and normals.
    pub fn flatten(&mut self) {
        let Some(matrix) = self.transform.take() else {
            return;
        };
        let linear = Matrix3::from_cols(
            matrix.x.truncate(),
            matrix.y.truncate(),
            matrix.z.truncate(),
        );
        let normal_matrix = linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear);
        for vertex in &mut self.vertices {
            vertex.position = matrix.transform_point(vertex.position.into()).into();
            let normal = normal_matrix * Vector3::from(vertex.normal);
            if normal.magnitude2() > 0.0 {
                vertex.normal = normal.normalize().into();
            }
        }
    }

    pub fn has_normals(&self) -> bool {
        self.vertices
            .iter()
            .any(|v| Vector3::from(v.normal).magnitude2() > 0.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MaterialData {
    pub name: String,
    pub diffuse: Option<RgbaImage>,
}

/// A loaded model before it is uploaded to the GPU.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
}

impl ModelData {
    pub fn bound(&self) -> BoundingSphere {
        BoundingSphere::from_points(
            self.meshes
                .iter()
                .flat_map(|mesh| mesh.vertices.iter())
                .map(|v| Point3::from(v.position)),
        )
    }

    /// Bakes every pending mesh transform into its vertices.
    pub fn flattened(mut self) -> Self {
        self.meshes.iter_mut().for_each(MeshData::flatten);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.indices.is_empty())
    }
}

#[derive(Debug)]
pub struct Material {
    #[allow(unused)]
    pub name: String,
    #[allow(unused)]
    pub diffuse_texture: Texture,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        diffuse_texture: Texture,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&diffuse_texture.sampler),
                },
            ],
            label: Some(name),
        });

        Self {
            name: String::from(name),
            diffuse_texture,
            bind_group,
        }
    }

    /// Uses `image` when present and a single white texel otherwise.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        image: Option<&RgbaImage>,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let texture = match image {
            Some(image) => Texture::from_rgba(device, queue, image, name),
            None => Texture::create_white(device, queue),
        };
        Self::new(device, name, texture, layout)
    }
}

#[derive(Debug)]
pub struct Mesh {
    #[allow(unused)]
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: usize,
}

impl Mesh {
    pub fn from_data(device: &wgpu::Device, data: &MeshData, material: usize) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            num_elements: data.indices.len() as u32,
            material,
        }
    }
}

#[derive(Debug)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

impl Model {
    /// Uploads `data`. Meshes without a material share an extra white one.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        data: &ModelData,
    ) -> Self {
        let mut materials: Vec<Material> = data
            .materials
            .iter()
            .map(|m| Material::from_image(device, queue, &m.name, m.diffuse.as_ref(), layout))
            .collect();
        let fallback = materials.len();
        materials.push(Material::from_image(device, queue, "default material", None, layout));

        let meshes = data
            .meshes
            .iter()
            .filter(|mesh| !mesh.indices.is_empty())
            .map(|mesh| {
                let material = mesh.material.filter(|&m| m < fallback).unwrap_or(fallback);
                Mesh::from_data(device, mesh, material)
            })
            .collect();

        Self { meshes, materials }
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a Mesh,
        material: &'a Material,
        instances: Range<u32>,
    );

    fn draw_model_instanced(&mut self, model: &'a Model, instances: Range<u32>);
}

/// Bind groups 1 to 3 (camera, light, pass) are set by the caller; this only
/// binds the per-mesh material at group 0.
impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b Mesh,
        material: &'b Material,
        instances: Range<u32>,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }

    fn draw_model_instanced(&mut self, model: &'b Model, instances: Range<u32>) {
        for mesh in &model.meshes {
            let material = &model.materials[mesh.material];
            self.draw_mesh_instanced(mesh, material, instances.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Vector3};

    use super::*;

    fn triangle() -> MeshData {
        MeshData {
            name: "tri".into(),
            vertices: vec![
                ModelVertex {
                    position: [0.0, 0.0, 0.0],
                    normal: [0.0, 0.0, 1.0],
                    ..Default::default()
                },
                ModelVertex {
                    position: [2.0, 0.0, 0.0],
                    normal: [0.0, 0.0, 1.0],
                    ..Default::default()
                },
                ModelVertex {
                    position: [0.0, 2.0, 0.0],
                    normal: [0.0, 0.0, 1.0],
                    ..Default::default()
                },
            ],
            indices: vec![0, 1, 2],
            material: None,
            transform: None,
        }
    }

    #[test]
    fn vertex_layout_matches_struct_size() {
        assert_eq!(
            ModelVertex::desc().array_stride as usize,
            std::mem::size_of::<ModelVertex>()
        );
        assert_eq!(std::mem::size_of::<ModelVertex>(), 8 * 4);
    }

    #[test]
    fn flatten_applies_and_clears_the_transform() {
        let mut mesh = triangle();
        mesh.transform = Some(
            Matrix4::from_translation(Vector3::new(0.0, 0.0, 5.0)) * Matrix4::from_angle_x(Deg(90.0)),
        );
        mesh.flatten();
        assert!(mesh.transform.is_none());
        let moved = mesh.vertices[2].position;
        assert!((moved[0] - 0.0).abs() < 1e-5);
        assert!((moved[1] - 0.0).abs() < 1e-5);
        assert!((moved[2] - 7.0).abs() < 1e-5);
        let normal = mesh.vertices[0].normal;
        assert!((normal[1] + 1.0).abs() < 1e-5, "{normal:?}");
    }

    #[test]
    fn bound_covers_every_mesh() {
        let mut far = triangle();
        far.vertices
            .iter_mut()
            .for_each(|v| v.position[0] += 10.0);
        let data = ModelData {
            meshes: vec![triangle(), far],
            materials: Vec::new(),
        };
        let bound = data.bound();
        for mesh in &data.meshes {
            for v in &mesh.vertices {
                assert!(bound.contains(v.position.into()));
            }
        }
        assert_eq!(data.vertex_count(), 6);
        assert!(!data.is_empty());
    }

    #[test]
    fn missing_normals_are_detected() {
        let mut mesh = triangle();
        assert!(mesh.has_normals());
        mesh.vertices.iter_mut().for_each(|v| v.normal = [0.0; 3]);
        assert!(!mesh.has_normals());
    }
}
