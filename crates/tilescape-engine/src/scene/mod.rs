//! Scene root and mesh types.
//!
//! Responsibilities:
//! - own every attached tile mesh (the root is the single owner)
//! - hand out stable [`NodeId`] handles to layers
//! - provide deterministic paint order (z + attach order) to renderers

mod mesh;
mod node;

pub use mesh::{Geometry, Texture, TextureId, TileMesh, Transform, UvRect};
pub use node::{MeshNode, NodeId, PaintKey, SceneRoot};
