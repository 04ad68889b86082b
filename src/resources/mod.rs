use anyhow::{Context as _, bail};

use crate::data_structures::model::ModelData;

/**
 * This module contains all logic for loading mesh/textures/etc. from external files.
 */
pub mod animation;
pub mod gltf;
pub mod obj;
pub mod texture;

pub use texture::{load_binary, load_image, load_string};

/// Model file formats understood by [`load_model_data`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Obj,
    Gltf,
}

impl ModelFormat {
    pub fn from_file_name(file_name: &str) -> anyhow::Result<Self> {
        match texture::extension(file_name).as_deref() {
            Some("obj") => Ok(Self::Obj),
            Some("gltf") | Some("glb") => Ok(Self::Gltf),
            Some(other) => bail!("unsupported model format .{other} ({file_name})"),
            None => bail!("{file_name} has no file extension to pick a model loader"),
        }
    }
}

/// Loads a model file and bakes its node transforms into the vertices.
///
/// Files without any triangles are rejected.
pub async fn load_model_data(file_name: &str) -> anyhow::Result<ModelData> {
    let model = match ModelFormat::from_file_name(file_name)? {
        ModelFormat::Obj => obj::parse_obj(file_name).await,
        ModelFormat::Gltf => self::gltf::parse_gltf(file_name).await,
    }
    .with_context(|| format!("failed to load model {file_name}"))?
    .flattened();

    if model.is_empty() {
        bail!("model {file_name} contains no triangles");
    }
    log::info!(
        "Loaded {file_name}: {} meshes, {} vertices, {} materials",
        model.meshes.len(),
        model.vertex_count(),
        model.materials.len()
    );
    Ok(model)
}
