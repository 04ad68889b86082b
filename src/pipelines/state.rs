//! Fixed-function state per render bin.
//!
//! A [`PassState`] is the data a classic state set would carry for one draw
//! bucket: stencil function and operations, colour mask, depth function,
//! depth range, face culling, blending and clipping. wgpu bakes most of this
//! into the pipeline, so every `PassState` becomes its own pipeline; the
//! stencil reference and the depth range are set dynamically on the pass.
//!
//! [`mirror_passes`] lists the five bins of the planar reflection:
//!
//! | bin | draws           | stencil              | colour | depth                 |
//! |-----|-----------------|----------------------|--------|-----------------------|
//! | 1   | mirror          | always 1, replace    | off    | less                  |
//! | 2   | model           | always 0, replace    | on     | less                  |
//! | 3   | mirror          | equal 1, keep        | off    | always, range (1, 1)  |
//! | 4   | reflected model | equal 1, keep        | on     | less, clipped         |
//! | 5   | mirror          | equal 1, zero        | add    | always                |

use crate::data_structures::texture::Texture;

/// Stencil comparison: `compare(reference & mask, stored & mask)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilFunc {
    pub compare: wgpu::CompareFunction,
    pub reference: u32,
    pub mask: u32,
}

impl StencilFunc {
    pub const fn always(reference: u32) -> Self {
        Self {
            compare: wgpu::CompareFunction::Always,
            reference,
            mask: !0,
        }
    }

    pub const fn equal(reference: u32) -> Self {
        Self {
            compare: wgpu::CompareFunction::Equal,
            reference,
            mask: !0,
        }
    }

    /// Whether a fragment passes against the `stored` stencil value.
    pub fn passes(&self, stored: u32) -> bool {
        let reference = self.reference & self.mask;
        let stored = stored & self.mask;
        match self.compare {
            wgpu::CompareFunction::Never => false,
            wgpu::CompareFunction::Less => reference < stored,
            wgpu::CompareFunction::Equal => reference == stored,
            wgpu::CompareFunction::LessEqual => reference <= stored,
            wgpu::CompareFunction::Greater => reference > stored,
            wgpu::CompareFunction::NotEqual => reference != stored,
            wgpu::CompareFunction::GreaterEqual => reference >= stored,
            wgpu::CompareFunction::Always => true,
        }
    }
}

/// Stencil operations in (stencil fail, depth fail, depth pass) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilOps {
    pub fail: wgpu::StencilOperation,
    pub depth_fail: wgpu::StencilOperation,
    pub pass: wgpu::StencilOperation,
}

impl StencilOps {
    pub const KEEP: Self = Self::on_pass(wgpu::StencilOperation::Keep);

    pub const fn on_pass(pass: wgpu::StencilOperation) -> Self {
        Self {
            fail: wgpu::StencilOperation::Keep,
            depth_fail: wgpu::StencilOperation::Keep,
            pass,
        }
    }

    /// Stencil value left behind by an operation on an 8-bit buffer.
    pub fn apply(op: wgpu::StencilOperation, stored: u8, reference: u32) -> u8 {
        match op {
            wgpu::StencilOperation::Keep => stored,
            wgpu::StencilOperation::Zero => 0,
            wgpu::StencilOperation::Replace => reference as u8,
            wgpu::StencilOperation::Invert => !stored,
            wgpu::StencilOperation::IncrementClamp => stored.saturating_add(1),
            wgpu::StencilOperation::DecrementClamp => stored.saturating_sub(1),
            wgpu::StencilOperation::IncrementWrap => stored.wrapping_add(1),
            wgpu::StencilOperation::DecrementWrap => stored.wrapping_sub(1),
        }
    }
}

/// What a bin draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Geometry {
    Mirror,
    Model,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassState {
    pub bin: i32,
    pub label: &'static str,
    pub geometry: Geometry,
    pub stencil: StencilFunc,
    pub stencil_ops: StencilOps,
    pub color_writes: wgpu::ColorWrites,
    pub depth_compare: wgpu::CompareFunction,
    pub depth_write: bool,
    /// Viewport depth range (`min_depth`, `max_depth`).
    pub depth_range: (f32, f32),
    pub cull_mode: Option<wgpu::Face>,
    pub blend: Option<wgpu::BlendState>,
    /// Apply the mirror's clip plane.
    pub clip: bool,
    /// Draw through the reflection matrix.
    pub reflected: bool,
}

impl PassState {
    /// Plain opaque rendering: depth less, colour on, no stencil effect.
    pub const fn opaque(bin: i32, label: &'static str, geometry: Geometry) -> Self {
        Self {
            bin,
            label,
            geometry,
            stencil: StencilFunc::always(0),
            stencil_ops: StencilOps::KEEP,
            color_writes: wgpu::ColorWrites::ALL,
            depth_compare: wgpu::CompareFunction::Less,
            depth_write: true,
            depth_range: (0.0, 1.0),
            cull_mode: Some(wgpu::Face::Back),
            blend: Some(wgpu::BlendState::REPLACE),
            clip: false,
            reflected: false,
        }
    }

    pub fn stencil_state(&self) -> wgpu::StencilState {
        let face = wgpu::StencilFaceState {
            compare: self.stencil.compare,
            fail_op: self.stencil_ops.fail,
            depth_fail_op: self.stencil_ops.depth_fail,
            pass_op: self.stencil_ops.pass,
        };
        let writes_stencil = [
            self.stencil_ops.fail,
            self.stencil_ops.depth_fail,
            self.stencil_ops.pass,
        ]
        .iter()
        .any(|op| *op != wgpu::StencilOperation::Keep);
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: self.stencil.mask,
            write_mask: if writes_stencil { !0 } else { 0 },
        }
    }

    pub fn depth_stencil_state(&self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: self.depth_write,
            depth_compare: self.depth_compare,
            stencil: self.stencil_state(),
            bias: wgpu::DepthBiasState::default(),
        }
    }

    pub fn color_target(&self, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: self.blend,
            write_mask: self.color_writes,
        }
    }

    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: self.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        }
    }

    /// Stencil value after a fragment of this pass lands on `stored`.
    ///
    /// `depth_passes` is the outcome of the depth test for that fragment.
    pub fn stencil_after(&self, stored: u8, depth_passes: bool) -> u8 {
        let op = if !self.stencil.passes(stored as u32) {
            self.stencil_ops.fail
        } else if !depth_passes {
            self.stencil_ops.depth_fail
        } else {
            self.stencil_ops.pass
        };
        let write_mask = self.stencil_state().write_mask as u8;
        let written = StencilOps::apply(op, stored, self.stencil.reference);
        (stored & !write_mask) | (written & write_mask)
    }

    /// Whether a fragment of this pass reaches the colour buffer.
    pub fn shades(&self, stored: u8, depth_passes: bool) -> bool {
        self.stencil.passes(stored as u32) && depth_passes && !self.color_writes.is_empty()
    }
}

/// The five bins of the planar mirror, in draw order.
pub fn mirror_passes() -> [PassState; 5] {
    let mark_mirror = PassState {
        stencil: StencilFunc::always(1),
        stencil_ops: StencilOps::on_pass(wgpu::StencilOperation::Replace),
        color_writes: wgpu::ColorWrites::empty(),
        cull_mode: None,
        ..PassState::opaque(1, "mirror stencil mask", Geometry::Mirror)
    };
    let scene = PassState {
        stencil: StencilFunc::always(0),
        stencil_ops: StencilOps::on_pass(wgpu::StencilOperation::Replace),
        ..PassState::opaque(2, "scene", Geometry::Model)
    };
    let reset_depth = PassState {
        stencil: StencilFunc::equal(1),
        stencil_ops: StencilOps::KEEP,
        color_writes: wgpu::ColorWrites::empty(),
        depth_compare: wgpu::CompareFunction::Always,
        depth_range: (1.0, 1.0),
        cull_mode: None,
        ..PassState::opaque(3, "mirror depth reset", Geometry::Mirror)
    };
    let reflection = PassState {
        stencil: StencilFunc::equal(1),
        stencil_ops: StencilOps::KEEP,
        cull_mode: None,
        clip: true,
        reflected: true,
        ..PassState::opaque(4, "reflected scene", Geometry::Model)
    };
    let additive = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    let surface = PassState {
        stencil: StencilFunc::equal(1),
        stencil_ops: StencilOps::on_pass(wgpu::StencilOperation::Zero),
        depth_compare: wgpu::CompareFunction::Always,
        cull_mode: None,
        blend: Some(wgpu::BlendState {
            color: additive,
            alpha: additive,
        }),
        ..PassState::opaque(5, "mirror surface", Geometry::Mirror)
    };
    [mark_mirror, scene, reset_depth, reflection, surface]
}
