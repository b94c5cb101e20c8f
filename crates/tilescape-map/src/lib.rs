//! Tilescape map layers on top of `tilescape-engine`.
//!
//! A [`TileLayer`] binds a [`TileSource`] to a [`Reconciler`], which keeps a
//! scene root populated with one mesh per loaded tile covering the view.
//! Raster tiles become textured quads that fade in; vector tiles are styled
//! and tessellated into one batched mesh per tile.
//!
//! # Frame loop
//!
//! ```rust,ignore
//! use tilescape_map::prelude::*;
//!
//! let mut jobs = JobQueue::new(JobQueueConfig::default());
//! let mut layer = TileLayer::raster(my_source, RasterLayerConfig::default());
//!
//! // Each frame:
//! let viewport = ViewportState::new(center, resolution, width, height);
//! layer.update(&viewport, &mut jobs);
//! jobs.drain();
//! renderer.render(&render_ctx, &mut target, layer.root_mut());
//! ```
//!
//! # Custom content
//!
//! Implement [`MeshStrategy`] to turn another tile type into meshes:
//!
//! ```rust,ignore
//! impl MeshStrategy for Heatmap {
//!     type Tile = DensityTile;
//!
//!     fn generate(&mut self, tile: &mut DensityTile, placement: &TilePlacement) -> MeshBuild {
//!         MeshBuild::Ready(self.mesh_for(tile.samples()))
//!     }
//! }
//! ```

pub mod grid;
pub mod layer;
pub mod projection;
pub mod raster;
pub mod reconcile;
pub mod tile;
pub mod vector;

pub use layer::TileLayer;
pub use reconcile::{MeshBuild, MeshStrategy, Reconciler, TilePlacement, UpdateOutcome};
pub use tile::{TileSource, Tile};

/// The types a host needs to drive map layers.
pub mod prelude {
    pub use crate::grid::{TileCoord, TileGrid, TileRange};
    pub use crate::layer::TileLayer;
    pub use crate::projection::{Projection, Units};
    pub use crate::raster::{RasterLayerConfig, RasterStrategy};
    pub use crate::reconcile::{MeshBuild, MeshStrategy, Reconciler, RenderEpoch, TilePlacement, UpdateOutcome};
    pub use crate::tile::{decode_image, ImageTile, Tile, TileKey, TileSource, TileState};
    pub use crate::vector::{
        Feature, GeometryKind, SourceTile, StyleFn, StyleSet, VectorLayerConfig, VectorStrategy, VectorTileData,
    };

    // Engine primitives hosts need alongside layers.
    pub use tilescape_engine::coords::{Extent, Vec2, ViewportState};
    pub use tilescape_engine::jobs::{DrainReport, JobQueue, JobQueueConfig};
    pub use tilescape_engine::paint::Color;
    pub use tilescape_engine::render::{RenderCtx, RenderTarget, TileMeshRenderer};
    pub use tilescape_engine::scene::{Geometry, SceneRoot, TileMesh};
}
