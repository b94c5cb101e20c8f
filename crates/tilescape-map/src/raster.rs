//! Raster tiles: one textured unit quad per tile.

use std::collections::HashMap;
use std::marker::PhantomData;

use tilescape_engine::scene::{Geometry, Texture, TileMesh, UvRect};

use crate::reconcile::{MeshBuild, MeshStrategy, TilePlacement};
use crate::tile::{ImageTile, TileKey};

/// Opacity this close to 1 is treated as fully faded in.
const FADE_EPSILON: f32 = 1e-3;

/// Raster layer configuration.
#[derive(Debug, Clone)]
pub struct RasterLayerConfig {
    /// Fraction of the remaining distance to full opacity covered per update.
    /// `1.0` disables fading.
    pub fade_rate: f32,
    /// Textures kept for tiles that left the view.
    pub texture_cache_capacity: usize,
}

impl Default for RasterLayerConfig {
    fn default() -> Self {
        Self { fade_rate: 0.2, texture_cache_capacity: 512 }
    }
}

struct CachedTexture {
    texture: Texture,
    /// The tile has been shown at full opacity before.
    faded_in: bool,
    last_used: u64,
}

/// Per-key texture cache with least-recently-used eviction.
///
/// Keeps the texture identity stable for a tile that scrolls out and back
/// in, so renderers do not upload it again.
pub struct TextureCache {
    capacity: usize,
    entries: HashMap<TileKey, CachedTexture>,
    tick: u64,
}

impl TextureCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), tick: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the cached texture for `key`, creating it with `make` on a
    /// miss. The flag tells whether the tile had already faded in.
    pub fn get_or_insert_with(&mut self, key: &TileKey, make: impl FnOnce() -> Texture) -> (Texture, bool) {
        self.tick += 1;
        let tick = self.tick;

        if let Some(cached) = self.entries.get_mut(key) {
            cached.last_used = tick;
            return (cached.texture.clone(), cached.faded_in);
        }

        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        let texture = make();
        self.entries.insert(key.clone(), CachedTexture { texture: texture.clone(), faded_in: false, last_used: tick });
        (texture, false)
    }

    pub fn mark_faded_in(&mut self, key: &TileKey) {
        if let Some(cached) = self.entries.get_mut(key) {
            cached.faded_in = true;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, c)| c.last_used)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            log::trace!("texture cache: evicted {key}");
        }
    }
}

/// Mesh strategy for raster tiles.
///
/// Builds a unit quad sampling the tile image and fades it in. A tile whose
/// texture is still cached from an earlier full fade-in appears at full
/// opacity immediately.
pub struct RasterStrategy<T> {
    config: RasterLayerConfig,
    textures: TextureCache,
    _tile: PhantomData<fn(&mut T)>,
}

impl<T> RasterStrategy<T> {
    pub fn new(config: RasterLayerConfig) -> Self {
        let textures = TextureCache::new(config.texture_cache_capacity);
        Self { config, textures, _tile: PhantomData }
    }

    #[inline]
    pub fn config(&self) -> &RasterLayerConfig {
        &self.config
    }

    #[inline]
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }
}

impl<T> Default for RasterStrategy<T> {
    fn default() -> Self {
        Self::new(RasterLayerConfig::default())
    }
}

impl<T: ImageTile> MeshStrategy for RasterStrategy<T> {
    type Tile = T;

    fn generate(&mut self, tile: &mut T, placement: &TilePlacement) -> MeshBuild {
        let Some(image) = tile.image() else {
            log::debug!("raster tile {} loaded without an image", tile.key());
            return MeshBuild::Ready(TileMesh::new(Geometry::Empty));
        };

        let size = [image.width(), image.height()];
        let (texture, faded_in) = self.textures.get_or_insert_with(tile.key(), || Texture::new(image));
        let uv = UvRect::inset(placement.gutter, size);

        let opacity = if faded_in || self.config.fade_rate >= 1.0 { 1.0 } else { 0.0 };
        MeshBuild::Ready(TileMesh::new(Geometry::TexturedQuad { texture, uv }).with_opacity(opacity))
    }

    fn update(&mut self, key: &TileKey, opacity: f32) -> f32 {
        if opacity >= 1.0 {
            return opacity;
        }
        let mut next = opacity + (1.0 - opacity) * self.config.fade_rate.clamp(0.0, 1.0);
        if 1.0 - next < FADE_EPSILON {
            next = 1.0;
            self.textures.mark_faded_in(key);
        }
        next
    }
}
