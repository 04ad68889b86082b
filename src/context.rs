use std::sync::Arc;

use anyhow::Context as _;
use winit::{dpi::PhysicalPosition, window::Window};

use crate::{
    camera::{self, CameraResources, Projection},
    data_structures::texture,
    pipelines::light::{LightResources, LightUniform},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButtonState {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MouseState {
    pub coords: PhysicalPosition<f64>,
    pub pressed: MouseButtonState,
}

/// Per-frame bindings shared by every draw: camera, light and target size.
#[derive(Clone, Copy)]
pub struct FrameBindings<'a> {
    pub camera: &'a wgpu::BindGroup,
    pub light: &'a wgpu::BindGroup,
    pub width: u32,
    pub height: u32,
}

pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub clear_colour: wgpu::Color,
    pub tick_duration_millis: u64,
    pub mouse: MouseState,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("camera", &self.camera.camera)
            .field("projection", &self.projection)
            .field("clear_colour", &self.clear_colour)
            .field("tick_duration_millis", &self.tick_duration_millis)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shader code assumes an Srgb surface texture. Using a different
        // one will result in all the colors coming out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        // Flows home the camera on init once the scene bound is known
        let camera = camera::Camera::new((0.0, 0.0, 0.0), 10.0, cgmath::Deg(0.0), cgmath::Deg(0.0));
        let projection =
            camera::Projection::new(config.width, config.height, cgmath::Deg(45.0), 0.1, 500.0);
        let camera = CameraResources::new(&device, camera, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(&device, LightUniform::headlight(camera.camera.eye()));

        Ok(Self {
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            window,
            depth_texture,
            clear_colour: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.4,
                a: 1.0,
            },
            tick_duration_millis: 500,
            mouse: MouseState::default(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn frame_bindings(&self) -> FrameBindings<'_> {
        FrameBindings {
            camera: &self.camera.bind_group,
            light: &self.light.bind_group,
            width: self.config.width,
            height: self.config.height,
        }
    }

    /// Uploads camera and headlight after the camera moved.
    pub fn write_camera(&mut self) {
        self.camera.write(&self.queue, &self.projection);
        self.light.follow(&self.queue, self.camera.camera.eye());
    }

    pub(crate) fn recreate_depth_texture(&mut self) {
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            "depth_texture",
        );
    }
}

/// Requests a device with default limits; WebGL gets its downlevel limits.
pub async fn request_device(adapter: &wgpu::Adapter) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features, so if
            // we're building for the web we'll have to disable some.
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .context("could not create a device")
}

/// The parts of [`Context`] a flow constructor needs to create GPU resources.
///
/// Device and queue are reference counted, so cloning this is cheap.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub color_format: wgpu::TextureFormat,
    pub camera_layout: wgpu::BindGroupLayout,
    pub light_layout: wgpu::BindGroupLayout,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            color_format: ctx.config.format,
            camera_layout: ctx.camera.bind_group_layout.clone(),
            light_layout: ctx.light.bind_group_layout.clone(),
        }
    }
}
