//! Render pipelines and their uniforms.
//!
//! - `state` describes the fixed-function state of every render bin
//! - `basic` turns those states into wgpu pipelines sharing one shader
//! - `bin_state` holds the per-bin transform and clip uniforms
//! - `light` is the headlight uniform

pub mod basic;
pub mod bin_state;
pub mod light;
pub mod state;
