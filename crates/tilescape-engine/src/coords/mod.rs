//! Coordinate and geometry types shared by the scene, renderers and layers.
//!
//! Canonical world space:
//! - projection units (e.g. web-mercator meters), `f64`
//! - +X right, +Y up
//!
//! Tile meshes store their geometry in a unit square and are placed into
//! world space by a per-node transform. Renderers make positions relative to
//! the view center before narrowing to `f32`.

mod extent;
mod vec2;
mod viewport;

pub use extent::Extent;
pub use vec2::Vec2;
pub use viewport::ViewportState;
