//! GPU rendering subsystem.
//!
//! Renderers read the [`SceneRoot`](crate::scene::SceneRoot) and issue GPU
//! commands via wgpu. Each renderer owns its GPU resources (pipelines,
//! buffers, uploaded textures).
//!
//! Convention:
//! - CPU geometry is in world units relative to the view center (y-up).
//! - The vertex shader rotates and scales to NDC using a view uniform.

mod common;
mod ctx;
mod frame;
mod tiles;

pub use ctx::{RenderCtx, RenderTarget};
pub use frame::{BatchKind, DrawBatch, FrameGeometry, TileVertex};
pub use tiles::TileMeshRenderer;
