//! stencil-mirror
//!
//! A planar mirror rendered the classic way: the mirror quad is written into
//! the stencil buffer, the scene is drawn normally, depth is reset where the
//! mirror is visible and the scene is drawn again reflected through the mirror
//! plane, clipped to the near side and masked by the stencil. Finally the
//! mirror surface is blended on top. Each step is one numbered render bin.
//!
//! High-level modules
//! - `camera`: orbit camera, controller and uniforms for view/projection
//! - `config`: demo settings from defaults, environment and command line
//! - `context`: central GPU and window context that owns device/queue
//! - `data_structures`: meshes, instances, textures and bounding spheres
//! - `flow`: high level flow control (scenes / update loops)
//! - `mirror`: mirror plane geometry, reflection matrix and clip plane
//! - `pipelines`: per-bin pipeline state, light and bin uniforms
//! - `render`: render bins and their ordering
//! - `resources`: helpers to load models/textures and the spin animation
//! - `scene`: the mirrored scene as GPU resources and draws
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod mirror;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use winit::dpi::PhysicalPosition;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
