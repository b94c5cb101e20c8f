//! Tilescape engine crate.
//!
//! Runtime pieces shared by the tile layers above it: world coordinates, the
//! scene root that owns attached meshes, the frame-budgeted job queue, and
//! the wgpu renderer that draws the scene root. The host owns the GPU device
//! and the frame loop.

pub mod coords;
pub mod jobs;
pub mod logging;
pub mod paint;
pub mod render;
pub mod scene;
pub mod time;
