use std::collections::HashMap;
use std::sync::Arc;

use tilescape_engine::coords::Extent;

use crate::projection::Projection;
use crate::tile::Tile;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    /// One or more polygons; rings are classified by winding.
    Polygon,
}

/// A vector feature with flat geometry.
///
/// `flat` holds `stride` values per point; `ends` holds the exclusive end
/// offset of each ring (or line string) into `flat`.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub kind: GeometryKind,
    pub flat: Vec<f64>,
    pub ends: Vec<usize>,
    pub stride: usize,
    pub properties: HashMap<String, String>,
}

impl Feature {
    pub fn new(kind: GeometryKind, flat: Vec<f64>, ends: Vec<usize>, stride: usize) -> Self {
        Self { kind, flat, ends, stride, properties: HashMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    #[inline]
    pub fn has_geometry(&self) -> bool {
        self.stride >= 2 && self.flat.len() >= self.stride && !self.ends.is_empty()
    }

    /// Rewrites x/y of every point with `f`. z and extra ordinates are kept.
    fn map_xy(&mut self, f: impl Fn(f64, f64) -> (f64, f64)) {
        if self.stride < 2 {
            return;
        }
        for p in self.flat.chunks_exact_mut(self.stride) {
            let (x, y) = f(p[0], p[1]);
            p[0] = x;
            p[1] = y;
        }
    }
}

/// Features of one source tile together with the projection they are in.
///
/// A source tile may come from a different grid level than the tile it is
/// rendered into; its own world extent then says where its pixels land.
#[derive(Debug, Clone)]
pub struct SourceTile {
    features: Arc<Vec<Feature>>,
    projection: Projection,
    extent: Option<Extent>,
}

impl SourceTile {
    /// Source tile covering exactly the tile it is rendered into.
    pub fn new(features: Vec<Feature>, projection: Projection) -> Self {
        Self { features: Arc::new(features), projection, extent: None }
    }

    /// Places the tile pixels onto `extent` (world units of the display
    /// projection) instead of the render tile's extent.
    pub fn with_extent(self, extent: Extent) -> Self {
        Self { extent: Some(extent), ..self }
    }

    #[inline]
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    #[inline]
    pub fn features(&self) -> &Arc<Vec<Feature>> {
        &self.features
    }

    #[inline]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Moves tile-pixel features into `to`, placing the pixel square onto the
    /// source tile's own extent, or `tile_extent` when it has none (pixel +Y
    /// down becomes world +Y up). Coordinates and the recorded projection
    /// change together, so this runs at most once.
    ///
    /// Returns whether anything was transformed. Features already in `to`
    /// are left alone; other projection pairs are not supported and are
    /// left unchanged with a warning.
    pub fn reproject(&mut self, to: &Projection, tile_extent: Extent) -> bool {
        if self.projection == *to {
            return false;
        }
        if !self.projection.is_tile_pixels() {
            log::warn!(
                "cannot reproject vector features from {} to {}",
                self.projection.code(),
                to.code()
            );
            return false;
        }

        let target = self.extent.unwrap_or(tile_extent);
        let px = self.projection.extent();
        let sx = target.width() / px.width();
        let sy = target.height() / px.height();
        let (min_x, max_y) = (target.min_x, target.max_y);

        let features = Arc::make_mut(&mut self.features);
        for feature in features.iter_mut() {
            feature.map_xy(|x, y| (min_x + (x - px.min_x) * sx, max_y - (y - px.min_y) * sy));
        }
        self.projection = to.clone();
        true
    }
}

/// A composite vector tile.
pub trait VectorTileData: Tile {
    fn source_tiles_mut(&mut self) -> &mut [SourceTile];
}
