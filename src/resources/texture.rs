use anyhow::Context as _;
use image::RgbaImage;

use crate::data_structures::texture;

/// Diffuse texture at binding 0 and its sampler at binding 1.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Material texture_bind_group_layout"),
    })
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window")?;
    let location = window.location();
    let origin = location
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

/// Copy of `assets/` the build script leaves in `OUT_DIR`.
#[cfg(not(target_arch = "wasm32"))]
pub const BUNDLED_ASSETS: &str = concat!(env!("OUT_DIR"), "/assets");

/// Resolves `file_name` on disk.
///
/// Paths that exist as given are used directly. Everything else is looked up
/// in `./assets` and then in [`BUNDLED_ASSETS`], so the binary also finds the
/// demo files when started outside the crate directory. Missing files resolve
/// into `./assets`.
#[cfg(not(target_arch = "wasm32"))]
pub fn asset_path(file_name: &str) -> std::path::PathBuf {
    let given = std::path::Path::new(file_name);
    if given.is_file() {
        return given.to_path_buf();
    }
    let local = std::path::Path::new("./").join("assets").join(file_name);
    if local.is_file() {
        return local;
    }
    let bundled = std::path::Path::new(BUNDLED_ASSETS).join(file_name);
    if bundled.is_file() {
        log::debug!("Using bundled asset {}", bundled.display());
        return bundled;
    }
    local
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = asset_path(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?
    };

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = asset_path(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?
    };

    Ok(data)
}

/// File extension of `file_name` in lower case, if any.
pub fn extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Loads and decodes an image file into RGBA8.
pub async fn load_image(file_name: &str) -> anyhow::Result<RgbaImage> {
    let data = load_binary(file_name).await?;
    texture::decode_image(&data, extension(file_name).as_deref())
        .with_context(|| format!("could not decode image {file_name}"))
}

pub async fn load_texture(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<texture::Texture> {
    let image = load_image(file_name).await?;
    Ok(texture::Texture::from_rgba(device, queue, &image, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_lower_cased() {
        assert_eq!(extension("models/Cessna.OBJ").as_deref(), Some("obj"));
        assert_eq!(extension("scene.glb").as_deref(), Some("glb"));
        assert_eq!(extension("no_extension"), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn unknown_files_resolve_into_assets() {
        let path = asset_path("definitely-not-here.obj");
        assert!(path.ends_with("assets/definitely-not-here.obj"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn demo_assets_are_bundled_with_the_build() {
        let bundled = std::path::Path::new(BUNDLED_ASSETS);
        for file in ["cessna.obj", "cessna.mtl", "tank.png"] {
            assert!(bundled.join(file).is_file(), "{file} missing from {BUNDLED_ASSETS}");
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn missing_files_name_the_path() {
        let err = load_binary("definitely-not-here.png").await.unwrap_err();
        assert!(format!("{err:#}").contains("definitely-not-here.png"));
    }
}
