use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{self, Vertex},
    },
    pipelines::state::PassState,
};

/// Bind group layouts shared by every mirror pass, in group order.
pub struct PassLayouts<'a> {
    pub material: &'a wgpu::BindGroupLayout,
    pub camera: &'a wgpu::BindGroupLayout,
    pub light: &'a wgpu::BindGroupLayout,
    pub pass: &'a wgpu::BindGroupLayout,
}

pub fn mk_pipeline_layout(device: &wgpu::Device, layouts: &PassLayouts) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mirror Pipeline Layout"),
        bind_group_layouts: &[layouts.material, layouts.camera, layouts.light, layouts.pass],
        immediate_size: 0,
    })
}

pub fn model_shader() -> wgpu::ShaderModuleDescriptor<'static> {
    wgpu::ShaderModuleDescriptor {
        label: Some("Model Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("model.wgsl").into()),
    }
}

/// One pipeline per render bin, in the order of `passes`.
pub fn mk_pass_pipelines(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    color_format: wgpu::TextureFormat,
    passes: &[PassState],
) -> Vec<wgpu::RenderPipeline> {
    let layout = mk_pipeline_layout(device, layouts);
    let shader = device.create_shader_module(model_shader());
    passes
        .iter()
        .map(|pass| {
            log::debug!("Creating pipeline for bin {} ({})", pass.bin, pass.label);
            mk_render_pipeline(
                device,
                &layout,
                color_format,
                pass,
                &[model::ModelVertex::desc(), InstanceRaw::desc()],
                &shader,
            )
        })
        .collect()
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    pass: &PassState,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(pass.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(pass.color_target(color_format))],
            compilation_options: Default::default(),
        }),
        primitive: pass.primitive_state(),
        depth_stencil: Some(pass.depth_stencil_state()),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
