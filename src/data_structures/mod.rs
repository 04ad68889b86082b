//! Engine data structures: models, textures, bounds and instances.
//!
//! - `model` contains mesh and material definitions, CPU data and GPU resources for 3D models
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `instance` holds the per-instance world and normal matrices
//! - `bounds` computes bounding spheres for mirror sizing and camera placement

pub mod bounds;
pub mod instance;
pub mod model;
pub mod texture;
