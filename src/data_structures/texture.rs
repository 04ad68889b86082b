//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU GPU texture resources,
//! and helper methods for creating the depth-stencil target and colour textures
//! from decoded images.

use anyhow::*;
use image::{ImageFormat, RgbaImage, load_from_memory_with_format};

/// A GPU texture with its view and sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    /// Combined depth and 8-bit stencil format.
    ///
    /// Every mirror pass tests or writes the stencil, so the depth target must
    /// carry at least eight stencil bits.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    /// Create the depth-stencil attachment used by every render pass.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        Self::create_depth_texture_with_usage(device, size, label, wgpu::TextureUsages::empty())
    }

    /// Like [`Self::create_depth_texture`] with additional usages, e.g. `COPY_SRC`
    /// to read the stencil aspect back.
    pub fn create_depth_texture_with_usage(
        device: &wgpu::Device,
        size: [u32; 2],
        label: &str,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | usage,
            view_formats: &[],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// A single opaque white texel.
    ///
    /// Stands in for missing diffuse maps so that untextured meshes and a
    /// mirror without an image still go through the textured pipeline.
    pub fn create_white(device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        Self::from_rgba(device, queue, &white, "white texture")
    }

    /// Load a texture from raw byte data (image file contents).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data (PNG, JPEG, etc.)
    /// * `label` is used as a debug name for the GPU resource
    /// * `format` is an optional file extension hint (e.g., "png"). If None, auto-detect.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
    ) -> Result<Self> {
        let img = decode_image(bytes, format)?;
        Ok(Self::from_rgba(device, queue, &img, label))
    }

    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &RgbaImage,
        label: &str,
    ) -> Self {
        let dimensions = rgba.dimensions();
        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_default_sampler(device);

        Self {
            texture,
            view,
            sampler,
        }
    }
}

/// Decodes image file contents into RGBA8.
///
/// `format` is a file extension; unknown extensions fall back to guessing
/// from the content.
pub fn decode_image(bytes: &[u8], format: Option<&str>) -> Result<RgbaImage> {
    let img = match format.and_then(ImageFormat::from_extension) {
        Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(img.to_rgba8())
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&default_sampler_descriptor())
}

/// Bilinear, repeating sampler shared by every colour texture.
pub fn default_sampler_descriptor() -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("colour sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_with_and_without_a_hint() {
        let bytes = png_bytes();
        for hint in [Some("png"), None, Some("not-an-extension")] {
            let img = decode_image(&bytes, hint).unwrap();
            assert_eq!(img.dimensions(), (2, 3));
            assert_eq!(img.get_pixel(1, 2).0, [10, 20, 30, 255]);
        }
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_image(&[0, 1, 2, 3], None).is_err());
    }

    #[test]
    fn colour_textures_filter_linearly() {
        let descriptor = default_sampler_descriptor();
        assert_eq!(descriptor.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(descriptor.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(descriptor.address_mode_v, wgpu::AddressMode::Repeat);
    }

    #[test]
    fn depth_format_carries_stencil() {
        assert!(Texture::DEPTH_FORMAT.has_stencil_aspect());
        assert!(Texture::DEPTH_FORMAT.has_depth_aspect());
    }
}
