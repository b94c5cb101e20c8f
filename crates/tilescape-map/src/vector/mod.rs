//! Vector tiles: features tessellated into one batched mesh per tile.
//!
//! A vector tile is a composite of source sub-tiles, each holding features
//! in its own projection (usually tile-pixel space). The strategy reprojects
//! each sub-tile once, applies the style function per feature and feeds the
//! tessellator.

mod feature;
mod strategy;
mod style;

pub use feature::{Feature, GeometryKind, SourceTile, VectorTileData};
pub use strategy::{build_tile_mesh, VectorLayerConfig, VectorStrategy};
pub use style::{StyleFn, StyleSet};
