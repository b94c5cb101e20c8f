use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::grid::{TileCoord, TileGrid};
use crate::projection::Projection;

/// Identity of a tile: unique per (coordinate, pixel ratio, projection).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TileKey {
    coord: TileCoord,
    pixel_ratio_bits: u64,
    projection: Arc<str>,
}

impl TileKey {
    pub fn new(coord: TileCoord, pixel_ratio: f64, projection: &Projection) -> Self {
        Self {
            coord,
            pixel_ratio_bits: pixel_ratio.to_bits(),
            projection: Arc::clone(projection.code_arc()),
        }
    }

    #[inline]
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    #[inline]
    pub fn pixel_ratio(&self) -> f64 {
        f64::from_bits(self.pixel_ratio_bits)
    }

    #[inline]
    pub fn projection_code(&self) -> &str {
        &self.projection
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.coord;
        write!(f, "{}/{}/{}/{}@{}x", self.projection, c.z, c.x, c.y, self.pixel_ratio())
    }
}

/// Load state of a tile.
///
/// `Idle → Loading → {Loaded | Error}`. An errored tile is asked to load
/// again on the next update.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TileState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

impl TileState {
    #[inline]
    pub fn is_loaded(self) -> bool {
        self == TileState::Loaded
    }
}

/// A tile as handed out by a [`TileSource`].
pub trait Tile {
    fn coord(&self) -> TileCoord;

    fn key(&self) -> &TileKey;

    fn state(&self) -> TileState;

    /// Starts loading. Must return immediately and be idempotent while a
    /// load is in flight; the state is polled on the next update.
    fn load(&mut self);
}

/// Raster tile with a decoded image.
pub trait ImageTile: Tile {
    /// Decoded pixels, once loaded. `None` for a loaded tile with no content.
    fn image(&self) -> Option<Arc<RgbaImage>>;
}

/// Tile provider consumed by the reconciler.
///
/// Fetching and caching of raw payloads stay behind this trait.
pub trait TileSource {
    type Tile: Tile;

    /// Returns the (possibly not yet loaded) tile at `coord`.
    fn tile(&mut self, coord: TileCoord, pixel_ratio: f64, projection: &Projection) -> &mut Self::Tile;

    fn tile_grid(&self) -> &TileGrid;

    fn projection(&self) -> &Projection;

    /// Increments whenever previously delivered tiles become invalid.
    fn revision(&self) -> u64;

    /// Pixel size of a tile image at `z`.
    fn tile_pixel_size(&self, z: u32, pixel_ratio: f64, projection: &Projection) -> [u32; 2] {
        let _ = (z, projection);
        let [w, h] = self.tile_grid().tile_size();
        let scale = if pixel_ratio.is_finite() && pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        [(w as f64 * scale).round() as u32, (h as f64 * scale).round() as u32]
    }

    /// Extra pixels around each tile image, per side, at pixel ratio 1.
    fn gutter(&self, projection: &Projection) -> u32 {
        let _ = projection;
        0
    }
}

/// Decodes an encoded tile image (PNG/JPEG/WebP) into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes).context("decoding tile image")?;
    Ok(image.to_rgba8())
}
