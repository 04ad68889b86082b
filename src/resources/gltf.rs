use anyhow::{Context as _, bail};
use cgmath::{Deg, Matrix4};

use crate::{
    data_structures::model::{MaterialData, MeshData, ModelData, ModelVertex},
    resources::{
        obj::solid_colour,
        texture::{load_binary, load_image},
    },
};

/// Reads a `.gltf` or `.glb` file.
///
/// Only the geometry of the default scene is kept. Node transforms are
/// stored on each mesh and still have to be flattened.
pub async fn parse_gltf(file_name: &str) -> anyhow::Result<ModelData> {
    let bytes = load_binary(file_name).await?;
    let gltf = ::gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("{file_name} is not a valid glTF file"))?;

    let buffer_data = load_buffers(&gltf, file_name).await?;

    let mut materials = Vec::new();
    for material in gltf.materials() {
        materials.push(load_material(&material, &buffer_data, file_name).await);
    }

    let meshes = scene_meshes(&gltf.document, &buffer_data);
    Ok(ModelData { meshes, materials })
}

/// Resolves `uri` next to the file that references it.
fn sibling(file_name: &str, uri: &str) -> String {
    match file_name.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{uri}"),
        None => uri.to_string(),
    }
}

async fn load_buffers(gltf: &::gltf::Gltf, file_name: &str) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            ::gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name} references a missing binary chunk"))?;
                buffer_data.push(blob.to_vec());
            }
            ::gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!("{file_name}: embedded data URIs are not supported, export as .glb");
            }
            ::gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_binary(&sibling(file_name, uri)).await?);
            }
        }
    }
    Ok(buffer_data)
}

async fn load_material(
    material: &::gltf::Material<'_>,
    buffer_data: &[Vec<u8>],
    file_name: &str,
) -> MaterialData {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{file_name}#{}", material.index().unwrap_or_default()));

    let image = match pbr.base_color_texture().map(|t| t.texture().source().source()) {
        Some(::gltf::image::Source::View { view, mime_type }) => {
            let start = view.offset();
            let end = start + view.length();
            buffer_data
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(start..end))
                .context("image view out of bounds")
                .and_then(|bytes| {
                    crate::data_structures::texture::decode_image(
                        bytes,
                        mime_type.split('/').next_back(),
                    )
                })
        }
        Some(::gltf::image::Source::Uri { uri, .. }) => load_image(&sibling(file_name, uri)).await,
        None => {
            return MaterialData {
                name,
                diffuse: Some(solid_colour([r, g, b])),
            };
        }
    };

    let diffuse = match image {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("Base colour texture of {name} is missing: {e:#}");
            Some(solid_colour([r, g, b]))
        }
    };
    MaterialData { name, diffuse }
}

/// Turns glTF's y-up axes into the z-up axes the mirror scene is built in.
pub fn y_up_to_z_up() -> Matrix4<f32> {
    Matrix4::from_angle_x(Deg(90.0))
}

/// Collects the triangle meshes of the default scene (or the first one).
///
/// Mesh transforms include [`y_up_to_z_up`].
pub fn scene_meshes(document: &::gltf::Document, buffer_data: &[Vec<u8>]) -> Vec<MeshData> {
    let mut meshes = Vec::new();
    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        log::warn!("glTF document has no scene");
        return meshes;
    };
    for node in scene.nodes() {
        collect_node(&node, y_up_to_z_up(), buffer_data, &mut meshes);
    }
    meshes
}

fn collect_node(
    node: &::gltf::Node,
    parent: Matrix4<f32>,
    buffer_data: &[Vec<u8>],
    meshes: &mut Vec<MeshData>,
) {
    let world = parent * Matrix4::from(node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or("mesh").to_string();
        for primitive in mesh.primitives() {
            if primitive.mode() != ::gltf::mesh::Mode::Triangles {
                log::warn!("Skipping non-triangle primitive of {mesh_name}");
                continue;
            }
            let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

            let mut vertices = Vec::new();
            if let Some(vertex_attribute) = reader.read_positions() {
                vertex_attribute.for_each(|vertex| {
                    vertices.push(ModelVertex {
                        position: vertex,
                        tex_coords: Default::default(),
                        normal: Default::default(),
                    })
                });
            }
            if let Some(normal_attribute) = reader.read_normals() {
                for (vertex, normal) in vertices.iter_mut().zip(normal_attribute) {
                    vertex.normal = normal;
                }
            }
            if let Some(tex_coord_attribute) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
                for (vertex, tex_coord) in vertices.iter_mut().zip(tex_coord_attribute) {
                    vertex.tex_coords = tex_coord;
                }
            }

            let indices = match reader.read_indices() {
                Some(indices_raw) => indices_raw.into_u32().collect::<Vec<u32>>(),
                None => (0..vertices.len() as u32).collect(),
            };

            meshes.push(MeshData {
                name: mesh_name.clone(),
                vertices,
                indices,
                material: primitive.material().index(),
                transform: Some(world),
            });
        }
    }
    for child in node.children() {
        collect_node(&child, world, buffer_data, meshes);
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Point3, Transform, Vector3};

    use super::*;

    fn chunk(kind: u32, mut data: Vec<u8>, pad: u8) -> Vec<u8> {
        while data.len() % 4 != 0 {
            data.push(pad);
        }
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend(data);
        out
    }

    /// One triangle under a translated parent node.
    fn triangle_glb() -> Vec<u8> {
        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [
                {"translation": [0.0, 0.0, 2.0], "children": [1]},
                {"mesh": 0, "scale": [2.0, 2.0, 2.0]}
            ],
            "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
            "buffers": [{"byteLength": 42}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 6}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ]
        }"#;
        let mut bin = Vec::new();
        for f in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }

        let json_chunk = chunk(0x4E4F_534A, json.as_bytes().to_vec(), b' ');
        let bin_chunk = chunk(0x004E_4942, bin, 0);
        let length = 12 + json_chunk.len() + bin_chunk.len();
        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(length as u32).to_le_bytes());
        glb.extend(json_chunk);
        glb.extend(bin_chunk);
        glb
    }

    #[test]
    fn node_transforms_are_accumulated() {
        let gltf = ::gltf::Gltf::from_slice(&triangle_glb()).unwrap();
        let buffers = vec![gltf.blob.clone().unwrap()];
        let meshes = scene_meshes(&gltf.document, &buffers);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].name, "tri");
        assert_eq!(meshes[0].indices, vec![0, 1, 2]);
        assert_eq!(meshes[0].material, None);

        let transform = meshes[0].transform.unwrap();
        let p = transform.transform_point(Point3::new(1.0, 0.0, 0.0));
        // scaled by the child, moved along glTF z (now -y) by the parent
        assert!((p - Point3::new(2.0, -2.0, 0.0)).magnitude2() < 1e-10);
    }

    #[test]
    fn y_up_models_stand_upright() {
        let up = y_up_to_z_up().transform_vector(Vector3::unit_y());
        assert!((up - Vector3::unit_z()).magnitude2() < 1e-10);
        let forward = y_up_to_z_up().transform_vector(Vector3::unit_z());
        assert!((forward + Vector3::unit_y()).magnitude2() < 1e-10);
    }

    #[test]
    fn flattening_bakes_the_transform() {
        let gltf = ::gltf::Gltf::from_slice(&triangle_glb()).unwrap();
        let buffers = vec![gltf.blob.clone().unwrap()];
        let model = ModelData {
            meshes: scene_meshes(&gltf.document, &buffers),
            materials: Vec::new(),
        }
        .flattened();
        assert!(model.meshes[0].transform.is_none());
        let [x, y, z] = model.meshes[0].vertices[2].position;
        assert!((Vector3::new(x, y, z) - Vector3::new(0.0, -2.0, 2.0)).magnitude2() < 1e-10);
    }

    #[test]
    fn uris_resolve_next_to_the_file() {
        assert_eq!(sibling("models/plane.gltf", "plane.bin"), "models/plane.bin");
        assert_eq!(sibling("plane.gltf", "plane.bin"), "plane.bin");
    }
}
