//! The mirrored scene on the GPU.
//!
//! [`MirrorScene`] owns everything the five render bins draw: the uploaded
//! model, the mirror quad with its texture, the spinning instance, one
//! pipeline and one bin-state uniform per bin.

use std::time::Duration;

use anyhow::bail;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::{
    config::Settings,
    context::{FrameBindings, InitContext},
    data_structures::{
        instance::InstanceRaw,
        model::{DrawModel, Material, MeshData, Mesh, Model, ModelData},
    },
    mirror::MirrorLayout,
    pipelines::{
        basic::{PassLayouts, mk_pass_pipelines},
        bin_state::{self, BinStateResources, BinStateUniform},
        state::{Geometry, PassState, mirror_passes},
    },
    render::{Binned, Render},
    resources::{animation::PathAnimator, texture::material_layout},
};

pub struct MirrorScene {
    layout: MirrorLayout,
    passes: [PassState; 5],
    pipelines: Vec<wgpu::RenderPipeline>,
    bins: Vec<BinStateResources>,
    model: Model,
    mirror_mesh: Mesh,
    mirror_material: Material,
    instance: InstanceRaw,
    instance_buffer: wgpu::Buffer,
    identity_buffer: wgpu::Buffer,
    animator: PathAnimator,
}

impl MirrorScene {
    /// Uploads `model` and builds the mirror under it.
    ///
    /// Without a `mirror_texture` the mirror surface is plain white.
    pub fn new(
        ctx: &InitContext,
        model: ModelData,
        mirror_texture: Option<RgbaImage>,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        if model.is_empty() {
            bail!("cannot build a mirror scene around an empty model");
        }
        let device = &ctx.device;
        let queue = &ctx.queue;

        let bound = model.bound();
        let layout = MirrorLayout::new(bound, settings);
        log::info!(
            "Mirror at z = {:.3}, {:.3} x {:.3}, model radius {:.3}",
            layout.plane.z,
            layout.plane.width(),
            layout.plane.depth(),
            bound.radius
        );

        let material_layout = material_layout(device);
        let gpu_model = Model::upload(device, queue, &material_layout, &model);

        let mirror_data = MeshData {
            name: "mirror".to_string(),
            vertices: layout.plane.vertices().to_vec(),
            indices: layout.plane.indices().to_vec(),
            material: Some(0),
            transform: None,
        };
        let mirror_mesh = Mesh::from_data(device, &mirror_data, 0);
        let mirror_material = Material::from_image(
            device,
            queue,
            "mirror",
            mirror_texture.as_ref(),
            &material_layout,
        );

        let mut animator = PathAnimator::spin(bound.center, settings.spin_axis, settings.spin_speed);
        if settings.start_paused {
            animator.pause();
        }

        let instance = InstanceRaw::from_matrix(animator.matrix());
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model Instance Buffer"),
            contents: bytemuck::cast_slice(&[instance]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let identity_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mirror Instance Buffer"),
            contents: bytemuck::cast_slice(&[InstanceRaw::identity()]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let bin_layout = bin_state::mk_bind_group_layout(device);
        let passes = mirror_passes();
        let pipelines = mk_pass_pipelines(
            device,
            &PassLayouts {
                material: &material_layout,
                camera: &ctx.camera_layout,
                light: &ctx.light_layout,
                pass: &bin_layout,
            },
            ctx.color_format,
            &passes,
        );
        let bins = passes
            .iter()
            .map(|pass| {
                BinStateResources::new(
                    device,
                    &bin_layout,
                    BinStateUniform::new(pass, &layout),
                    pass.label,
                )
            })
            .collect();

        Ok(Self {
            layout,
            passes,
            pipelines,
            bins,
            model: gpu_model,
            mirror_mesh,
            mirror_material,
            instance,
            instance_buffer,
            identity_buffer,
            animator,
        })
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    pub fn passes(&self) -> &[PassState] {
        &self.passes
    }

    pub fn animator(&self) -> &PathAnimator {
        &self.animator
    }

    pub fn animator_mut(&mut self) -> &mut PathAnimator {
        &mut self.animator
    }

    /// The model's current world matrix, before the scene root.
    pub fn instance(&self) -> &InstanceRaw {
        &self.instance
    }

    /// Advances the spin by `dt` and uploads the model instance.
    pub fn update(&mut self, queue: &wgpu::Queue, dt: Duration) {
        self.animator.advance(dt.as_secs_f32());
        let instance = InstanceRaw::from_matrix(self.animator.matrix());
        if instance != self.instance {
            self.instance = instance;
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&[instance]));
        }
    }

    /// Draws the bin at `index` of [`Self::passes`].
    pub fn draw_bin(&self, index: usize, frame: &FrameBindings, render_pass: &mut wgpu::RenderPass<'_>) {
        let pass = &self.passes[index];
        render_pass.set_pipeline(&self.pipelines[index]);
        render_pass.set_stencil_reference(pass.stencil.reference);
        let (min_depth, max_depth) = pass.depth_range;
        render_pass.set_viewport(
            0.0,
            0.0,
            frame.width as f32,
            frame.height as f32,
            min_depth,
            max_depth,
        );
        render_pass.set_bind_group(1, frame.camera, &[]);
        render_pass.set_bind_group(2, frame.light, &[]);
        render_pass.set_bind_group(3, &self.bins[index].bind_group, &[]);
        match pass.geometry {
            Geometry::Mirror => {
                render_pass.set_vertex_buffer(1, self.identity_buffer.slice(..));
                render_pass.draw_mesh_instanced(&self.mirror_mesh, &self.mirror_material, 0..1);
            }
            Geometry::Model => {
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                render_pass.draw_model_instanced(&self.model, 0..1);
            }
        }
    }

    /// Draws all bins in order, outside of a flow.
    pub fn draw_all(&self, frame: &FrameBindings, render_pass: &mut wgpu::RenderPass<'_>) {
        for index in 0..self.passes.len() {
            self.draw_bin(index, frame, render_pass);
        }
    }

    /// One [`Binned`] draw per render bin.
    pub fn render<'pass>(&self) -> Render<'_, 'pass> {
        Render::Binned(
            self.passes
                .iter()
                .enumerate()
                .map(|(index, pass)| {
                    Binned::new(pass.bin, pass.label, move |ctx, render_pass| {
                        self.draw_bin(index, &ctx.frame_bindings(), render_pass)
                    })
                })
                .collect(),
        )
    }
}
