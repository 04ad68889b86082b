//! Render composition and bin ordering.
//!
//! Flows describe what to draw each frame with a [`Render`] tree. Every draw
//! belongs to a numbered render bin; the engine flattens the trees of all
//! flows and issues the draws in ascending bin order, so a flow can rely on
//! bin 3 running after bin 2 no matter where either was declared. Draws that
//! share a bin keep their declaration order.
//!
//! # Key types
//!
//! - [`Render<'a, 'pass>`] is the tree returned by `GraphicsFlow::on_render`
//! - [`Binned<'a, 'pass>`] is a single draw tagged with its bin
//!

use wgpu::RenderPass;

use crate::context::Context;

/// A deferred draw call: sets its own state on the pass and draws.
pub type DrawFn<'a, 'pass> = Box<dyn 'a + FnOnce(&Context, &mut RenderPass<'pass>)>;

/// Render bin of [`Render::Custom`] draws.
pub const CUSTOM_BIN: i32 = 0;

/// A draw call assigned to a render bin.
pub struct Binned<'a, 'pass> {
    pub bin: i32,
    pub label: &'a str,
    pub draw: DrawFn<'a, 'pass>,
}

impl<'a, 'pass> Binned<'a, 'pass> {
    pub fn new(
        bin: i32,
        label: &'a str,
        draw: impl 'a + FnOnce(&Context, &mut RenderPass<'pass>),
    ) -> Self {
        Self {
            bin,
            label,
            draw: Box::new(draw),
        }
    }
}

/// Specifies what a flow renders this frame.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Binned(Vec<Binned>)` renders draws in their bins
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
/// - `Custom(...)` invokes a closure in bin [`CUSTOM_BIN`]
///
pub enum Render<'a, 'pass>
where
    'pass: 'a,
{
    None,
    Binned(Vec<Binned<'a, 'pass>>),
    Composed(Vec<Render<'a, 'pass>>),
    Custom(DrawFn<'a, 'pass>),
}

impl<'a, 'pass> Render<'a, 'pass> {
    fn collect(self, out: &mut Vec<Binned<'a, 'pass>>) {
        match self {
            Render::None => (),
            Render::Binned(mut binned) => out.append(&mut binned),
            Render::Composed(renders) => renders.into_iter().for_each(|render| render.collect(out)),
            Render::Custom(draw) => out.push(Binned {
                bin: CUSTOM_BIN,
                label: "custom",
                draw,
            }),
        }
    }

    /// Flattens the tree into draws sorted by bin.
    ///
    /// The sort is stable: draws within one bin stay in traversal order.
    pub fn into_bins(self) -> Vec<Binned<'a, 'pass>> {
        let mut bins = Vec::new();
        self.collect(&mut bins);
        bins.sort_by_key(|binned| binned.bin);
        bins
    }

    /// Issues every draw in bin order.
    pub(crate) fn draw(self, ctx: &Context, render_pass: &mut RenderPass<'pass>) {
        for binned in self.into_bins() {
            log::trace!("bin {}: {}", binned.bin, binned.label);
            (binned.draw)(ctx, render_pass);
        }
    }
}

impl<'a, 'pass> From<Binned<'a, 'pass>> for Render<'a, 'pass> {
    fn from(binned: Binned<'a, 'pass>) -> Self {
        Render::Binned(vec![binned])
    }
}

impl<'a, 'pass> From<Vec<Render<'a, 'pass>>> for Render<'a, 'pass> {
    fn from(renders: Vec<Render<'a, 'pass>>) -> Self {
        Render::Composed(renders)
    }
}
