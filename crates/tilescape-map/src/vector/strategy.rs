use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tilescape_engine::coords::{Extent, Vec2};
use tilescape_engine::scene::{Geometry, TileMesh};
use tilescape_tess::{tessellate_lines, tessellate_polygons, FlatRings, MeshBuffers, PolygonStyle, TessStats};

use super::{Feature, GeometryKind, StyleFn, VectorTileData};
use crate::projection::Projection;
use crate::reconcile::{MeshBuild, MeshStrategy, TilePlacement};

/// Vector layer configuration.
#[derive(Debug, Clone)]
pub struct VectorLayerConfig {
    /// Build meshes through the job queue instead of inside `update()`.
    pub defer: bool,
    /// Expiry of a queued build; an expired build is resubmitted on the next
    /// update that still needs the tile.
    pub job_timeout: Option<Duration>,
}

impl Default for VectorLayerConfig {
    fn default() -> Self {
        Self { defer: true, job_timeout: None }
    }
}

/// Mesh strategy for vector tiles. Meshes start opaque and never fade.
pub struct VectorStrategy<T> {
    style: StyleFn,
    display: Projection,
    config: VectorLayerConfig,
    _tile: PhantomData<fn(&mut T)>,
}

impl<T> VectorStrategy<T> {
    /// `display` is the projection tile extents are expressed in.
    pub fn new(style: StyleFn, display: Projection, config: VectorLayerConfig) -> Self {
        Self { style, display, config, _tile: PhantomData }
    }

    #[inline]
    pub fn config(&self) -> &VectorLayerConfig {
        &self.config
    }
}

impl<T: VectorTileData> MeshStrategy for VectorStrategy<T> {
    type Tile = T;

    fn generate(&mut self, tile: &mut T, placement: &TilePlacement) -> MeshBuild {
        let mut layers = Vec::new();
        for source in tile.source_tiles_mut() {
            source.reproject(&self.display, placement.extent);
            layers.push(Arc::clone(source.features()));
        }

        let style = self.style.clone();
        let extent = placement.extent;
        let resolution = placement.resolution;

        if self.config.defer {
            let key = tile.key().clone();
            MeshBuild::deferred(
                move || {
                    let mesh = build_tile_mesh(&layers, extent, resolution, &style);
                    log::trace!("vector tile {key}: built deferred mesh");
                    Ok(mesh)
                },
                self.config.job_timeout,
            )
        } else {
            MeshBuild::Ready(build_tile_mesh(&layers, extent, resolution, &style))
        }
    }
}

/// Styles and tessellates every feature into one mesh in tile-local unit
/// space. Features must already be in the projection of `extent`.
pub fn build_tile_mesh(layers: &[Arc<Vec<Feature>>], extent: Extent, resolution: f64, style: &StyleFn) -> TileMesh {
    let mut out = MeshBuffers::new();
    let mut stats = TessStats::default();
    let mut unit = Vec::new();

    for feature in layers.iter().flat_map(|l| l.iter()) {
        if !feature.has_geometry() || feature.kind == GeometryKind::Point {
            continue;
        }
        let Some(set) = style(feature, resolution) else { continue };
        if !set.is_visible() {
            continue;
        }

        to_unit_space(feature, extent, &mut unit);
        let rings = FlatRings::new(&unit, &feature.ends, feature.stride);

        match feature.kind {
            GeometryKind::Polygon => {
                let polygon_style = PolygonStyle::new(set.fill.map(|c| c.to_array()), set.stroke.map(|c| c.to_array()));
                stats += tessellate_polygons(&mut out, &rings, &polygon_style);
            }
            GeometryKind::LineString => {
                if let Some(stroke) = set.stroke {
                    stats += tessellate_lines(&mut out, &rings, stroke.to_array());
                }
            }
            GeometryKind::Point => {}
        }
    }

    if stats.skipped_rings > 0 || stats.failed_polygons > 0 {
        log::debug!(
            "vector tile: skipped {} rings, {} polygons failed to triangulate",
            stats.skipped_rings,
            stats.failed_polygons
        );
    }

    TileMesh::new(Geometry::Vector(out))
}

fn to_unit_space(feature: &Feature, extent: Extent, out: &mut Vec<f64>) {
    out.clear();
    out.extend_from_slice(&feature.flat);
    for p in out.chunks_exact_mut(feature.stride) {
        let u = extent.to_unit(Vec2::new(p[0], p[1]));
        p[0] = u.x;
        p[1] = u.y;
    }
}
