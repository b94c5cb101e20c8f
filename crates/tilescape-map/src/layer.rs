use tilescape_engine::coords::ViewportState;
use tilescape_engine::jobs::JobQueue;
use tilescape_engine::scene::SceneRoot;
use tilescape_engine::time::Clock;

use crate::raster::{RasterLayerConfig, RasterStrategy};
use crate::reconcile::{MeshStrategy, Reconciler, UpdateOutcome};
use crate::tile::{ImageTile, TileSource};
use crate::vector::{StyleFn, VectorLayerConfig, VectorStrategy, VectorTileData};

/// A tile source bound to a reconciler and a mesh strategy.
///
/// ```rust,ignore
/// let mut layer = TileLayer::raster(source, RasterLayerConfig::default());
///
/// // every frame:
/// layer.update(&viewport, &mut jobs);
/// jobs.drain();
/// renderer.render(&ctx, &mut target, layer.root_mut());
/// ```
pub struct TileLayer<S, M> {
    source: S,
    reconciler: Reconciler<M>,
}

impl<S, M> TileLayer<S, M>
where
    S: TileSource,
    M: MeshStrategy<Tile = S::Tile>,
{
    pub fn new(source: S, strategy: M) -> Self {
        Self { source, reconciler: Reconciler::new(strategy) }
    }

    /// Paint z for every mesh of this layer.
    pub fn with_z(self, z: i32) -> Self {
        Self { source: self.source, reconciler: self.reconciler.with_z(z) }
    }

    pub fn update<C: Clock>(&mut self, viewport: &ViewportState, jobs: &mut JobQueue<C>) -> UpdateOutcome {
        self.reconciler.update(&mut self.source, viewport, jobs)
    }

    #[inline]
    pub fn root(&self) -> &SceneRoot {
        self.reconciler.root()
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut SceneRoot {
        self.reconciler.root_mut()
    }

    #[inline]
    pub fn reconciler(&self) -> &Reconciler<M> {
        &self.reconciler
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable source access. Changes that invalidate delivered tiles must
    /// bump the source revision.
    #[inline]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Swaps the source, discarding every mesh built from the old one.
    pub fn replace_source(&mut self, source: S) -> S {
        self.reconciler.clear();
        std::mem::replace(&mut self.source, source)
    }
}

impl<S> TileLayer<S, RasterStrategy<S::Tile>>
where
    S: TileSource,
    S::Tile: ImageTile,
{
    pub fn raster(source: S, config: RasterLayerConfig) -> Self {
        Self::new(source, RasterStrategy::new(config))
    }
}

impl<S> TileLayer<S, VectorStrategy<S::Tile>>
where
    S: TileSource,
    S::Tile: VectorTileData,
{
    /// Vector layer displaying tiles in the source's projection.
    pub fn vector(source: S, style: StyleFn, config: VectorLayerConfig) -> Self {
        let display = source.projection().clone();
        Self::new(source, VectorStrategy::new(style, display, config))
    }
}
