use anyhow::{bail, Result};
use tilescape_engine::coords::{Extent, Vec2};

/// Coordinates closer than this to a tile boundary (in tiles) snap onto it.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Tile address: zoom level plus column/row. Rows grow downward from the
/// grid origin (XYZ scheme).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TileCoord {
    pub z: u32,
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    #[inline]
    pub const fn new(z: u32, x: i64, y: i64) -> Self {
        Self { z, x, y }
    }
}

/// Inclusive integer rectangle of tiles at one zoom level.
///
/// A range whose min exceeds its max on either axis covers no tiles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TileRange {
    pub z: u32,
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl TileRange {
    #[inline]
    pub const fn new(z: u32, min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self { z, min_x, min_y, max_x, max_y }
    }

    #[inline]
    pub const fn empty(z: u32) -> Self {
        Self { z, min_x: 0, min_y: 0, max_x: -1, max_y: -1 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    #[inline]
    pub fn width(&self) -> u64 {
        if self.is_empty() { 0 } else { (self.max_x - self.min_x + 1) as u64 }
    }

    #[inline]
    pub fn height(&self) -> u64 {
        if self.is_empty() { 0 } else { (self.max_y - self.min_y + 1) as u64 }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.width() * self.height()
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.z == self.z
            && (self.min_x..=self.max_x).contains(&coord.x)
            && (self.min_y..=self.max_y).contains(&coord.y)
    }

    pub fn intersect(&self, other: &TileRange) -> TileRange {
        if self.z != other.z {
            return TileRange::empty(self.z);
        }
        let r = TileRange::new(
            self.z,
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if r.is_empty() { TileRange::empty(self.z) } else { r }
    }

    /// Iterates covered coordinates column by column.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + use<> {
        let (z, min_y, max_y) = (self.z, self.min_y, self.max_y);
        let xs = if self.is_empty() { 1..=0 } else { self.min_x..=self.max_x };
        xs.flat_map(move |x| (min_y..=max_y).map(move |y| TileCoord::new(z, x, y)))
    }
}

/// Tile pyramid over a projection extent.
///
/// Resolutions (world units per tile pixel) are stored coarsest first, so the
/// zoom level is the index into them. The origin is the top-left corner of
/// tile `(0, 0)` at every level.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    extent: Extent,
    origin: Vec2,
    resolutions: Vec<f64>,
    tile_size: [u32; 2],
}

impl TileGrid {
    pub fn new(extent: Extent, resolutions: Vec<f64>, tile_size: [u32; 2]) -> Result<Self> {
        if extent.is_empty() || !extent.is_finite() {
            bail!("tile grid extent must be finite and non-empty: {extent:?}");
        }
        if resolutions.is_empty() {
            bail!("tile grid needs at least one resolution");
        }
        if resolutions.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            bail!("tile grid resolutions must be positive: {resolutions:?}");
        }
        if resolutions.windows(2).any(|w| w[1] >= w[0]) {
            bail!("tile grid resolutions must be strictly descending: {resolutions:?}");
        }
        if tile_size[0] == 0 || tile_size[1] == 0 {
            bail!("tile size must be non-zero: {tile_size:?}");
        }

        let origin = Vec2::new(extent.min_x, extent.max_y);
        Ok(Self { extent, origin, resolutions, tile_size })
    }

    /// Standard XYZ pyramid: one tile covers `extent` at z = 0, each level
    /// halves the resolution.
    pub fn xyz(extent: Extent, max_zoom: u32, tile_size: u32) -> Result<Self> {
        let base = extent.width().max(extent.height()) / tile_size.max(1) as f64;
        let resolutions = (0..=max_zoom).map(|z| base / 2f64.powi(z as i32)).collect();
        Self::new(extent, resolutions, [tile_size, tile_size])
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn tile_size(&self) -> [u32; 2] {
        self.tile_size
    }

    #[inline]
    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    #[inline]
    pub fn max_zoom(&self) -> u32 {
        (self.resolutions.len() - 1) as u32
    }

    #[inline]
    pub fn resolution(&self, z: u32) -> Option<f64> {
        self.resolutions.get(z as usize).copied()
    }

    /// Zoom level whose resolution is nearest to `resolution`.
    ///
    /// Ties go to the coarser level. Out-of-range requests clamp to the
    /// first or last level.
    pub fn z_for_resolution(&self, resolution: f64) -> u32 {
        let mut best = 0usize;
        let mut best_diff = f64::INFINITY;
        for (z, r) in self.resolutions.iter().enumerate() {
            let diff = (r - resolution).abs();
            // Strict comparison keeps the coarser level on a tie.
            if diff < best_diff {
                best = z;
                best_diff = diff;
            }
        }
        best as u32
    }

    /// World size of one tile at `z`.
    fn tile_span(&self, z: u32) -> Option<(f64, f64)> {
        let res = self.resolution(z)?;
        Some((res * self.tile_size[0] as f64, res * self.tile_size[1] as f64))
    }

    /// World extent of a tile.
    pub fn tile_coord_extent(&self, coord: TileCoord) -> Extent {
        let (w, h) = self.tile_span(coord.z).unwrap_or((0.0, 0.0));
        let min_x = self.origin.x + coord.x as f64 * w;
        let max_y = self.origin.y - coord.y as f64 * h;
        Extent::new(min_x, max_y - h, min_x + w, max_y)
    }

    /// Every tile of level `z` that intersects the grid extent.
    pub fn full_tile_range(&self, z: u32) -> TileRange {
        self.covering_range(self.extent, z)
    }

    /// Tiles at `z` intersecting `extent`, clamped to the grid.
    pub fn tile_range_for_extent_and_z(&self, extent: Extent, z: u32) -> TileRange {
        if extent.is_empty() || !extent.is_finite() || self.resolution(z).is_none() {
            return TileRange::empty(z);
        }
        self.covering_range(extent, z).intersect(&self.full_tile_range(z))
    }

    fn covering_range(&self, extent: Extent, z: u32) -> TileRange {
        let Some((w, h)) = self.tile_span(z) else { return TileRange::empty(z) };

        let min_x = snap((extent.min_x - self.origin.x) / w).floor() as i64;
        let max_x = snap((extent.max_x - self.origin.x) / w).ceil() as i64 - 1;
        let min_y = snap((self.origin.y - extent.max_y) / h).floor() as i64;
        let max_y = snap((self.origin.y - extent.min_y) / h).ceil() as i64 - 1;

        TileRange::new(z, min_x, min_y, max_x, max_y)
    }
}

#[inline]
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < BOUNDARY_EPSILON { r } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x4 world of 256-unit tiles at z = 2, 1 unit per pixel at z = 2.
    fn grid() -> TileGrid {
        TileGrid::xyz(Extent::new(0.0, 0.0, 1024.0, 1024.0), 2, 256).unwrap()
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn xyz_halves_resolution_per_level() {
        let g = grid();
        assert_eq!(g.resolutions(), &[4.0, 2.0, 1.0]);
        assert_eq!(g.origin(), Vec2::new(0.0, 1024.0));
        assert_eq!(g.max_zoom(), 2);
    }

    #[test]
    fn rejects_ascending_resolutions() {
        let ext = Extent::new(0.0, 0.0, 1.0, 1.0);
        assert!(TileGrid::new(ext, vec![1.0, 2.0], [256, 256]).is_err());
        assert!(TileGrid::new(ext, vec![], [256, 256]).is_err());
        assert!(TileGrid::new(ext, vec![1.0], [0, 256]).is_err());
    }

    // ── zoom selection ────────────────────────────────────────────────────

    #[test]
    fn nearest_resolution_wins() {
        let g = grid();
        assert_eq!(g.z_for_resolution(4.0), 0);
        assert_eq!(g.z_for_resolution(2.2), 1);
        assert_eq!(g.z_for_resolution(1.2), 2);
        assert_eq!(g.z_for_resolution(100.0), 0);
        assert_eq!(g.z_for_resolution(0.01), 2);
    }

    #[test]
    fn tie_goes_to_coarser_level() {
        let g = grid();
        assert_eq!(g.z_for_resolution(3.0), 0);
        assert_eq!(g.z_for_resolution(1.5), 1);
    }

    // ── tile extents ──────────────────────────────────────────────────────

    #[test]
    fn rows_grow_downward() {
        let g = grid();
        assert_eq!(g.tile_coord_extent(TileCoord::new(2, 0, 0)), Extent::new(0.0, 768.0, 256.0, 1024.0));
        assert_eq!(g.tile_coord_extent(TileCoord::new(2, 1, 3)), Extent::new(256.0, 0.0, 512.0, 256.0));
    }

    // ── ranges ────────────────────────────────────────────────────────────

    #[test]
    fn exact_boundaries_do_not_leak_a_neighbor() {
        let g = grid();
        let r = g.tile_range_for_extent_and_z(Extent::new(256.0, 256.0, 768.0, 768.0), 2);
        assert_eq!(r, TileRange::new(2, 1, 1, 2, 2));
        assert_eq!(r.count(), 4);
    }

    #[test]
    fn partial_overlap_includes_touched_tiles() {
        let g = grid();
        let r = g.tile_range_for_extent_and_z(Extent::new(10.0, 10.0, 300.0, 20.0), 2);
        assert_eq!(r, TileRange::new(2, 0, 3, 1, 3));
    }

    #[test]
    fn range_is_clamped_to_grid() {
        let g = grid();
        let r = g.tile_range_for_extent_and_z(Extent::new(-5000.0, -5000.0, 5000.0, 5000.0), 1);
        assert_eq!(r, TileRange::new(1, 0, 0, 1, 1));
    }

    #[test]
    fn extent_outside_grid_is_empty() {
        let g = grid();
        let r = g.tile_range_for_extent_and_z(Extent::new(2000.0, 2000.0, 3000.0, 3000.0), 2);
        assert!(r.is_empty());
        assert_eq!(r.iter().count(), 0);
    }

    #[test]
    fn iter_visits_every_tile_once() {
        let r = TileRange::new(3, 2, 5, 4, 6);
        let coords: Vec<_> = r.iter().collect();
        assert_eq!(coords.len(), 6);
        assert!(coords.iter().all(|c| r.contains(*c)));
        assert_eq!(coords[0], TileCoord::new(3, 2, 5));
    }

    #[test]
    fn ranges_compare_all_bounds_and_zoom() {
        let a = TileRange::new(1, 0, 0, 1, 1);
        assert_eq!(a, TileRange::new(1, 0, 0, 1, 1));
        assert_ne!(a, TileRange::new(2, 0, 0, 1, 1));
        assert_ne!(a, TileRange::new(1, 0, 0, 1, 2));
    }
}
