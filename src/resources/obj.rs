use std::io::{BufReader, Cursor};

use image::{Rgba, RgbaImage};

use crate::{
    data_structures::model::{MaterialData, MeshData, ModelData, ModelVertex},
    resources::texture::{load_image, load_string},
};

pub fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/// Reads a Wavefront OBJ file and the MTL files it references.
///
/// Material libraries or textures that fail to load are logged and skipped,
/// the geometry itself must parse.
pub async fn parse_obj(file_name: &str) -> anyhow::Result<ModelData> {
    let obj_text: String = load_string(file_name).await?;
    let obj_cursor = Cursor::new(obj_text);
    let mut obj_reader = BufReader::new(obj_cursor);

    let (models, obj_materials) =
        tobj::load_obj_buf_async(&mut obj_reader, &load_options(), |p| async move {
            match load_string(&p).await {
                Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                Err(e) => {
                    log::warn!("Material library {p} could not be loaded: {e:#}");
                    Err(tobj::LoadError::OpenFileFailed)
                }
            }
        })
        .await?;

    let obj_materials = obj_materials.unwrap_or_else(|e| {
        log::warn!("{file_name} is drawn without materials: {e}");
        Vec::new()
    });

    let mut materials = Vec::with_capacity(obj_materials.len());
    for m in &obj_materials {
        let diffuse = match &m.diffuse_texture {
            Some(texture_file) => match load_image(texture_file).await {
                Ok(image) => Some(image),
                Err(e) => {
                    log::warn!("Texture of material {} is missing: {e:#}", m.name);
                    m.diffuse.map(solid_colour)
                }
            },
            None => m.diffuse.map(solid_colour),
        };
        materials.push(MaterialData {
            name: m.name.clone(),
            diffuse,
        });
    }

    Ok(ModelData {
        meshes: mesh_data(&models, &materials),
        materials,
    })
}

/// A one texel image of an MTL `Kd` colour.
pub fn solid_colour(kd: [f32; 3]) -> RgbaImage {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    RgbaImage::from_pixel(1, 1, Rgba([channel(kd[0]), channel(kd[1]), channel(kd[2]), 255]))
}

/// Converts triangulated, single-index tobj models.
///
/// Missing normals and texture coordinates default to zero; `v` is flipped
/// into wgpu's top-left texture origin. Material ids outside `materials` are
/// dropped.
pub fn mesh_data(models: &[tobj::Model], materials: &[MaterialData]) -> Vec<MeshData> {
    models
        .iter()
        .map(|m| {
            let vertices = (0..m.mesh.positions.len() / 3)
                .map(|i| ModelVertex {
                    position: [
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ],
                    tex_coords: [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                    normal: [
                        m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                })
                .collect::<Vec<_>>();

            let mesh = MeshData {
                name: m.name.clone(),
                vertices,
                indices: m.mesh.indices.clone(),
                material: m.mesh.material_id.filter(|id| *id < materials.len()),
                transform: None,
            };
            if !mesh.has_normals() {
                log::warn!("Mesh {} has no normals and will be drawn unlit", m.name);
            }
            mesh
        })
        .collect::<Vec<_>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn parse(text: &str) -> Vec<tobj::Model> {
        let (models, _) = tobj::load_obj_buf(&mut Cursor::new(text), &load_options(), |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
        .unwrap();
        models
    }

    #[test]
    fn quads_are_triangulated() {
        let meshes = mesh_data(&parse(QUAD), &[]);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].name, "quad");
        assert_eq!(meshes[0].indices.len(), 6);
        assert_eq!(meshes[0].vertices.len(), 4);
        assert!(meshes[0].has_normals());
    }

    #[test]
    fn texture_v_is_flipped() {
        let meshes = mesh_data(&parse(QUAD), &[]);
        let first = meshes[0]
            .vertices
            .iter()
            .find(|v| v.position == [0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(first.tex_coords, [0.0, 1.0]);
    }

    #[test]
    fn missing_attributes_default_to_zero() {
        let meshes = mesh_data(&parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n"), &[]);
        assert_eq!(meshes[0].vertices.len(), 3);
        assert!(!meshes[0].has_normals());
        assert!(meshes[0].vertices.iter().all(|v| v.tex_coords[0] == 0.0));
        assert_eq!(meshes[0].material, None);
    }

    #[test]
    fn kd_becomes_a_single_texel() {
        let image = solid_colour([1.0, 0.5, 2.0]);
        assert_eq!(image.dimensions(), (1, 1));
        assert_eq!(image.get_pixel(0, 0).0, [255, 128, 255, 255]);
    }
}
