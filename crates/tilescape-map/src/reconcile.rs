//! Viewport → tile set reconciliation.
//!
//! Every frame the [`Reconciler`] computes the tile range covering the view
//! and diffs it against its mesh cache: missing tiles are loaded, newly
//! loaded tiles get a mesh attached to the scene root, tiles that left the
//! range are disposed. A committed [`RenderEpoch`] lets an unchanged view
//! skip the scan entirely.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use tilescape_engine::coords::{Extent, ViewportState};
use tilescape_engine::jobs::JobQueue;
use tilescape_engine::scene::{NodeId, SceneRoot, TileMesh, Transform};
use tilescape_engine::time::Clock;

use crate::grid::{TileCoord, TileRange};
use crate::tile::{Tile, TileKey, TileSource};

/// Deferred mesh construction, run later by the job queue.
pub type BuildFn = Box<dyn FnOnce() -> Result<TileMesh>>;

/// Result of [`MeshStrategy::generate`].
pub enum MeshBuild {
    /// Mesh is ready to attach now. Its opacity is the initial fade opacity.
    Ready(TileMesh),
    /// Mesh is built by a job; the tile counts as pending until it lands.
    Deferred { build: BuildFn, timeout: Option<Duration> },
}

impl MeshBuild {
    pub fn deferred(build: impl FnOnce() -> Result<TileMesh> + 'static, timeout: Option<Duration>) -> Self {
        MeshBuild::Deferred { build: Box::new(build), timeout }
    }
}

/// Where a tile mesh is going to be placed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TilePlacement {
    pub coord: TileCoord,
    /// World extent of the tile.
    pub extent: Extent,
    /// Tile pixel ratio (tile image pixels per CSS pixel).
    pub pixel_ratio: f64,
    /// Gutter of the tile image in image pixels, per side.
    pub gutter: u32,
    /// Image size without the gutter.
    pub tile_pixel_size: [u32; 2],
    /// Grid resolution at `coord.z` (world units per tile pixel).
    pub resolution: f64,
}

/// Per-content-kind mesh lifecycle used by a [`Reconciler`].
pub trait MeshStrategy {
    type Tile: Tile;

    /// Builds the mesh for a loaded tile, in tile-local unit space.
    fn generate(&mut self, tile: &mut Self::Tile, placement: &TilePlacement) -> MeshBuild;

    /// Called once a mesh has been detached from the scene root.
    fn dispose(&mut self, key: &TileKey, mesh: TileMesh) {
        let _ = (key, mesh);
    }

    /// Fade step, run every update for every cached mesh. Returns the new
    /// opacity.
    fn update(&mut self, key: &TileKey, opacity: f32) -> f32 {
        let _ = key;
        opacity
    }
}

/// Range, revision and tile pixel size of the last fully loaded scan.
///
/// The pixel size is part of every tile key, so a pixel ratio change must
/// rescan even when range and revision match.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RenderEpoch {
    pub range: TileRange,
    pub revision: u64,
    pub tile_pixel_size: [u32; 2],
}

/// Cached mesh of one tile.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeshEntry {
    node: NodeId,
    opacity: f32,
    to_delete: bool,
}

impl MeshEntry {
    /// Scene root node holding the mesh.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }
}

struct PendingBuild {
    slot: Rc<RefCell<Option<TileMesh>>>,
    transform: Transform,
    to_delete: bool,
}

/// Summary of one [`Reconciler::update`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// The scan was skipped because the epoch matched.
    pub fast_path: bool,
    pub range: Option<TileRange>,
    pub created: usize,
    pub evicted: usize,
    pub retained: usize,
    /// Tiles whose deferred build has not landed yet.
    pub pending: usize,
    /// Tiles that were asked to load.
    pub not_loaded: usize,
    /// The scan was fully loaded and its epoch committed.
    pub committed: bool,
}

/// Keeps a mesh cache equal to the set of loaded tiles covering the view.
///
/// The reconciler owns its [`SceneRoot`]; cache entries refer to scene nodes
/// by id only.
pub struct Reconciler<M> {
    strategy: M,
    entries: HashMap<TileKey, MeshEntry>,
    pending: HashMap<TileKey, PendingBuild>,
    epoch: Option<RenderEpoch>,
    root: SceneRoot,
    z: i32,
}

impl<M: MeshStrategy> Reconciler<M> {
    pub fn new(strategy: M) -> Self {
        Self {
            strategy,
            entries: HashMap::new(),
            pending: HashMap::new(),
            epoch: None,
            root: SceneRoot::new(),
            z: 0,
        }
    }

    /// Paint z of every mesh this reconciler attaches.
    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    #[inline]
    pub fn strategy(&self) -> &M {
        &self.strategy
    }

    #[inline]
    pub fn strategy_mut(&mut self) -> &mut M {
        &mut self.strategy
    }

    #[inline]
    pub fn root(&self) -> &SceneRoot {
        &self.root
    }

    /// Mutable root access for renderers (paint order caching).
    #[inline]
    pub fn root_mut(&mut self) -> &mut SceneRoot {
        &mut self.root
    }

    #[inline]
    pub fn epoch(&self) -> Option<RenderEpoch> {
        self.epoch
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

    #[inline]
    pub fn entry(&self, key: &TileKey) -> Option<&MeshEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.entries.keys()
    }

    /// Number of deferred builds still in flight.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Disposes every mesh, drops pending builds and invalidates the epoch.
    pub fn clear(&mut self) {
        let keys: Vec<TileKey> = self.entries.keys().cloned().collect();
        for key in keys {
            self.dispose(&key);
        }
        self.pending.clear();
        self.epoch = None;
    }

    /// Reconciles the mesh cache with the tiles covering `viewport`.
    ///
    /// Deferred builds are queued on `jobs`; the host drains the queue once
    /// per frame.
    pub fn update<S, C>(&mut self, source: &mut S, viewport: &ViewportState, jobs: &mut JobQueue<C>) -> UpdateOutcome
    where
        S: TileSource<Tile = M::Tile>,
        C: Clock,
    {
        let mut outcome = UpdateOutcome::default();

        if !viewport.is_valid() {
            log::debug!("reconciler: invalid viewport {viewport:?}; skipping scan");
            self.fade_step();
            return outcome;
        }

        let projection = source.projection().clone();
        let grid = source.tile_grid();
        let z = grid.z_for_resolution(viewport.resolution);
        let resolution = grid.resolution(z).unwrap_or(viewport.resolution);
        let base_size = grid.tile_size();
        let range = grid.tile_range_for_extent_and_z(viewport.visible_extent(), z);
        let revision = source.revision();

        let tile_pixel_size = source.tile_pixel_size(z, viewport.pixel_ratio, &projection);
        let pixel_ratio = if base_size[0] > 0 && tile_pixel_size[0] > 0 {
            tile_pixel_size[0] as f64 / base_size[0] as f64
        } else {
            viewport.pixel_ratio
        };
        let gutter = (source.gutter(&projection) as f64 * pixel_ratio).round() as u32;

        outcome.range = Some(range);

        let current = RenderEpoch { range, revision, tile_pixel_size };
        if self.epoch == Some(current) {
            outcome.fast_path = true;
            outcome.retained = self.entries.len();
            self.fade_step();
            return outcome;
        }

        log::trace!("reconciler: scanning {range:?} at revision {revision}");

        for entry in self.entries.values_mut() {
            entry.to_delete = true;
        }
        for pending in self.pending.values_mut() {
            pending.to_delete = true;
        }

        let mut all_loaded = true;

        for coord in range.iter() {
            let extent = source.tile_grid().tile_coord_extent(coord);
            let tile = source.tile(coord, pixel_ratio, &projection);
            let key = tile.key().clone();

            if !tile.state().is_loaded() {
                all_loaded = false;
                outcome.not_loaded += 1;
                tile.load();
                continue;
            }

            if let Some(entry) = self.entries.get_mut(&key) {
                entry.to_delete = false;
                outcome.retained += 1;
                continue;
            }

            match self.poll_pending(&key) {
                Poll::Landed(mesh, transform) => {
                    self.attach(key, mesh, transform);
                    outcome.created += 1;
                    continue;
                }
                Poll::Waiting => {
                    all_loaded = false;
                    outcome.pending += 1;
                    continue;
                }
                Poll::Absent => {}
            }

            let placement = TilePlacement {
                coord,
                extent,
                pixel_ratio,
                gutter,
                tile_pixel_size,
                resolution,
            };
            let transform = Transform::from_extent(extent);

            match self.strategy.generate(tile, &placement) {
                MeshBuild::Ready(mesh) => {
                    self.attach(key, mesh, transform);
                    outcome.created += 1;
                }
                MeshBuild::Deferred { build, timeout } => {
                    let slot = Rc::new(RefCell::new(None));
                    jobs.enqueue(
                        &slot,
                        move |out: &mut Option<TileMesh>| {
                            *out = Some(build()?);
                            Ok(())
                        },
                        timeout,
                    );
                    self.pending.insert(key, PendingBuild { slot, transform, to_delete: false });
                    all_loaded = false;
                    outcome.pending += 1;
                }
            }
        }

        let stale: Vec<TileKey> = self
            .entries
            .iter()
            .filter(|(_, e)| e.to_delete)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.dispose(key);
        }
        outcome.evicted = stale.len();

        // Dropping the slot turns the queued job into a no-op.
        self.pending.retain(|_, p| !p.to_delete);

        if all_loaded {
            self.epoch = Some(current);
            outcome.committed = true;
        } else {
            self.epoch = None;
        }

        if outcome.created > 0 || outcome.evicted > 0 {
            log::debug!(
                "reconciler: {range:?} created {} evicted {} retained {} pending {} not loaded {}{}",
                outcome.created,
                outcome.evicted,
                outcome.retained,
                outcome.pending,
                outcome.not_loaded,
                if outcome.committed { " (committed)" } else { "" },
            );
        }

        self.fade_step();
        outcome
    }

    fn poll_pending(&mut self, key: &TileKey) -> Poll {
        let Some(pending) = self.pending.get_mut(key) else {
            return Poll::Absent;
        };
        pending.to_delete = false;

        let landed = pending.slot.borrow_mut().take();
        if let Some(mesh) = landed {
            let transform = pending.transform;
            self.pending.remove(key);
            return Poll::Landed(mesh, transform);
        }

        // No job holds the slot any more: it expired or failed.
        if Rc::weak_count(&pending.slot) == 0 {
            log::debug!("reconciler: build for {key} was lost; resubmitting");
            self.pending.remove(key);
            return Poll::Absent;
        }

        Poll::Waiting
    }

    fn attach(&mut self, key: TileKey, mesh: TileMesh, transform: Transform) {
        let opacity = mesh.opacity;
        let node = self.root.add_with_z(mesh, transform, self.z);
        self.entries.insert(key, MeshEntry { node, opacity, to_delete: false });
    }

    fn dispose(&mut self, key: &TileKey) {
        let Some(entry) = self.entries.remove(key) else {
            debug_assert!(false, "disposing unknown tile {key}");
            return;
        };
        match self.root.remove(entry.node) {
            Some(node) => self.strategy.dispose(key, node.mesh),
            None => debug_assert!(false, "tile {key} has no scene node"),
        }
    }

    fn fade_step(&mut self) {
        for (key, entry) in self.entries.iter_mut() {
            let next = self.strategy.update(key, entry.opacity);
            if next == entry.opacity {
                continue;
            }
            entry.opacity = next;
            if let Some(node) = self.root.get_mut(entry.node) {
                node.mesh.opacity = next;
            }
        }
    }
}

enum Poll {
    Absent,
    Waiting,
    Landed(TileMesh, Transform),
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use anyhow::anyhow;
    use tilescape_engine::coords::Vec2;
    use tilescape_engine::jobs::JobQueueConfig;
    use tilescape_engine::scene::Geometry;
    use tilescape_engine::time::ManualClock;

    use super::*;
    use crate::grid::TileGrid;
    use crate::projection::Projection;
    use crate::tile::TileState;

    // ── fixtures ──────────────────────────────────────────────────────────

    struct FakeTile {
        coord: TileCoord,
        key: TileKey,
        state: TileState,
        loads: usize,
    }

    impl Tile for FakeTile {
        fn coord(&self) -> TileCoord {
            self.coord
        }
        fn key(&self) -> &TileKey {
            &self.key
        }
        fn state(&self) -> TileState {
            self.state
        }
        fn load(&mut self) {
            self.loads += 1;
            if self.state == TileState::Idle {
                self.state = TileState::Loading;
            }
        }
    }

    struct FakeSource {
        grid: TileGrid,
        projection: Projection,
        tiles: HashMap<TileKey, FakeTile>,
        revision: u64,
        /// New tiles start loaded.
        instant: bool,
        gutter: u32,
    }

    impl FakeSource {
        fn new(instant: bool) -> Self {
            Self {
                grid: TileGrid::xyz(Extent::new(0.0, 0.0, 2048.0, 2048.0), 3, 256).unwrap(),
                projection: Projection::web_mercator(),
                tiles: HashMap::new(),
                revision: 0,
                instant,
                gutter: 0,
            }
        }

        fn finish_loads(&mut self) {
            for t in self.tiles.values_mut() {
                if t.state == TileState::Loading {
                    t.state = TileState::Loaded;
                }
            }
        }
    }

    impl TileSource for FakeSource {
        type Tile = FakeTile;

        fn tile(&mut self, coord: TileCoord, pixel_ratio: f64, projection: &Projection) -> &mut FakeTile {
            let instant = self.instant;
            let key = TileKey::new(coord, pixel_ratio, projection);
            self.tiles.entry(key.clone()).or_insert_with(|| FakeTile {
                coord,
                key,
                state: if instant { TileState::Loaded } else { TileState::Idle },
                loads: 0,
            })
        }
        fn tile_grid(&self) -> &TileGrid {
            &self.grid
        }
        fn projection(&self) -> &Projection {
            &self.projection
        }
        fn revision(&self) -> u64 {
            self.revision
        }
        fn gutter(&self, _projection: &Projection) -> u32 {
            self.gutter
        }
    }

    #[derive(Default)]
    struct CountingStrategy {
        generated: usize,
        placements: Vec<TilePlacement>,
        disposed: Vec<TileKey>,
        defer: bool,
        fail: bool,
    }

    impl MeshStrategy for CountingStrategy {
        type Tile = FakeTile;

        fn generate(&mut self, _tile: &mut FakeTile, placement: &TilePlacement) -> MeshBuild {
            self.generated += 1;
            self.placements.push(*placement);
            let mesh = TileMesh::new(Geometry::Empty).with_opacity(0.0);
            if self.fail {
                MeshBuild::deferred(|| Err(anyhow!("no mesh")), None)
            } else if self.defer {
                MeshBuild::deferred(move || Ok(mesh), None)
            } else {
                MeshBuild::Ready(mesh)
            }
        }

        fn dispose(&mut self, key: &TileKey, _mesh: TileMesh) {
            self.disposed.push(key.clone());
        }

        fn update(&mut self, _key: &TileKey, opacity: f32) -> f32 {
            opacity + (1.0 - opacity) * 0.5
        }
    }

    /// 512x512 px view at z = 3 (1 unit/px) covering exactly 2x2 tiles.
    fn view(cx: f64, cy: f64) -> ViewportState {
        ViewportState::new(Vec2::new(cx, cy), 1.0, 512.0, 512.0)
    }

    /// 1024x256 px view at z = 3 covering four tiles of row 5.
    fn strip(cx: f64) -> ViewportState {
        ViewportState::new(Vec2::new(cx, 640.0), 1.0, 1024.0, 256.0)
    }

    fn jobs() -> JobQueue<ManualClock> {
        JobQueue::with_clock(JobQueueConfig::default(), ManualClock::new())
    }

    fn cached_coords<M: MeshStrategy>(rec: &Reconciler<M>) -> HashSet<TileCoord> {
        rec.keys().map(TileKey::coord).collect()
    }

    // ── scanning ──────────────────────────────────────────────────────────

    #[test]
    fn loaded_tiles_are_attached_and_committed() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.created, 4);
        assert!(out.committed);
        assert_eq!(rec.len(), 4);
        assert_eq!(rec.root().len(), 4);
        assert_eq!(rec.epoch().map(|e| e.range), out.range);
    }

    #[test]
    fn attached_node_covers_tile_extent() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        rec.update(&mut src, &view(512.0, 512.0), &mut jobs());

        let grid = src.tile_grid().clone();
        for key in rec.keys() {
            let node = rec.root().get(rec.entry(key).unwrap().node()).unwrap();
            assert_eq!(node.transform, Transform::from_extent(grid.tile_coord_extent(key.coord())));
        }
    }

    #[test]
    fn unchanged_view_takes_fast_path() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        let nodes: Vec<_> = rec.keys().map(|k| (k.clone(), rec.entry(k).unwrap().node())).collect();

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert!(out.fast_path);
        assert_eq!(rec.strategy().generated, 4);
        for (key, node) in nodes {
            assert_eq!(rec.entry(&key).unwrap().node(), node);
        }
    }

    #[test]
    fn revision_bump_forces_rescan_without_rebuild() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        src.revision += 1;
        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert!(!out.fast_path);
        assert_eq!(out.retained, 4);
        assert_eq!(out.created, 0);
        assert!(out.committed);
    }

    #[test]
    fn unloaded_tiles_block_commit_and_are_loaded() {
        let mut src = FakeSource::new(false);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.not_loaded, 4);
        assert!(!out.committed);
        assert!(rec.epoch().is_none());
        assert!(src.tiles.values().all(|t| t.loads == 1 && t.state == TileState::Loading));

        // Same view again: no epoch, so it scans (and polls) again.
        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert!(!out.fast_path);

        src.finish_loads();
        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.created, 4);
        assert!(out.committed);
    }

    #[test]
    fn disjoint_move_evicts_everything() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        let old: Vec<TileKey> = rec.keys().cloned().collect();

        let out = rec.update(&mut src, &view(1536.0, 1536.0), &mut q);
        assert_eq!(out.evicted, 4);
        assert_eq!(out.created, 4);
        for key in &old {
            assert!(!rec.contains(key));
        }
        assert_eq!(rec.root().len(), 4);
        assert_eq!(rec.strategy().disposed.len(), 4);
    }

    #[test]
    fn invalid_viewport_is_a_no_op() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let out = rec.update(&mut src, &ViewportState::new(Vec2::zero(), 0.0, 0.0, 0.0), &mut jobs());
        assert_eq!(out, UpdateOutcome::default());
        assert!(rec.is_empty());
    }

    #[test]
    fn non_finite_viewport_keeps_cache() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();
        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        let epoch = rec.epoch();

        let broken = [
            view(512.0, 512.0).with_rotation(f64::NAN),
            ViewportState { width: f64::INFINITY, ..view(512.0, 512.0) },
            view(512.0, 512.0).with_pixel_ratio(f64::NAN),
        ];
        for vp in &broken {
            let out = rec.update(&mut src, vp, &mut q);
            assert_eq!(out, UpdateOutcome::default());
            assert_eq!(rec.len(), 4);
            assert_eq!(rec.root().len(), 4);
            assert_eq!(rec.epoch(), epoch);
        }
        assert!(rec.strategy().disposed.is_empty());
    }

    #[test]
    fn one_tile_shift_reconciles_in_a_single_update() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        let first = rec.update(&mut src, &strip(512.0), &mut q);
        assert_eq!(first.created, 4);
        let e1 = rec.epoch();

        let out = rec.update(&mut src, &strip(768.0), &mut q);
        assert_eq!((out.created, out.evicted, out.retained), (1, 1, 3));
        assert!(out.committed);
        assert_ne!(rec.epoch(), e1);
        assert_eq!(rec.epoch().map(|e| e.range), out.range);
        assert_eq!(rec.strategy().disposed.iter().map(TileKey::coord).collect::<Vec<_>>(), vec![TileCoord::new(3, 0, 5)]);
    }

    #[test]
    fn committed_cache_matches_covering_range() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        for vp in [view(512.0, 512.0), strip(512.0), strip(768.0), view(1536.0, 1536.0)] {
            let out = rec.update(&mut src, &vp, &mut q);
            assert!(out.committed);
            let range = out.range.unwrap();
            assert_eq!(cached_coords(&rec), range.iter().collect::<HashSet<_>>());
            assert_eq!(rec.root().len(), range.count() as usize);
        }
    }

    #[test]
    fn pixel_ratio_scales_tile_size_and_gutter() {
        let mut src = FakeSource::new(true);
        src.gutter = 1;
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0).with_pixel_ratio(2.0), &mut q);
        assert_eq!(rec.strategy().placements.len(), 4);
        for p in &rec.strategy().placements {
            assert_eq!(p.pixel_ratio, 2.0);
            assert_eq!(p.tile_pixel_size, [512, 512]);
            assert_eq!(p.gutter, 2);
        }
        assert!(rec.keys().all(|k| k.pixel_ratio() == 2.0));
    }

    #[test]
    fn pixel_ratio_change_rescans_same_range() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        let out = rec.update(&mut src, &view(512.0, 512.0).with_pixel_ratio(2.0), &mut q);
        assert!(!out.fast_path);
        assert_eq!((out.created, out.evicted), (4, 4));
        assert!(rec.keys().all(|k| k.pixel_ratio() == 2.0));
    }

    // ── fading ────────────────────────────────────────────────────────────

    #[test]
    fn fade_runs_on_fast_path_and_syncs_nodes() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        rec.update(&mut src, &view(512.0, 512.0), &mut q);

        for key in rec.keys() {
            let entry = rec.entry(key).unwrap();
            // 0 -> 0.5 -> 0.75
            assert!((entry.opacity() - 0.75).abs() < 1e-6);
            assert_eq!(rec.root().get(entry.node()).unwrap().mesh.opacity, entry.opacity());
        }
    }

    // ── deferred builds ───────────────────────────────────────────────────

    #[test]
    fn deferred_builds_attach_after_drain() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy { defer: true, ..Default::default() });
        let mut q = jobs();

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.pending, 4);
        assert!(!out.committed);
        assert!(rec.is_empty());
        assert_eq!(q.len(), 4);

        q.drain();
        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.created, 4);
        assert!(out.committed);
        assert_eq!(rec.pending_len(), 0);
        assert_eq!(rec.strategy().generated, 4);
    }

    #[test]
    fn waiting_build_is_not_resubmitted() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy { defer: true, ..Default::default() });
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(rec.strategy().generated, 4);
        assert_eq!(q.len(), 4);
    }

    #[test]
    fn failed_build_is_resubmitted() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy { fail: true, ..Default::default() });
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        let report = q.drain();
        assert_eq!(report.failures.len(), 4);

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.pending, 4);
        assert_eq!(rec.strategy().generated, 8);
    }

    #[test]
    fn leaving_range_drops_pending_builds() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy { defer: true, ..Default::default() });
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        rec.update(&mut src, &view(1536.0, 1536.0), &mut q);
        assert_eq!(rec.pending_len(), 4);

        // The first four jobs lost their receivers.
        let report = q.drain();
        assert_eq!(report.orphaned, 4);
        assert_eq!(report.executed, 4);
    }

    // ── clear ─────────────────────────────────────────────────────────────

    #[test]
    fn clear_disposes_and_invalidates() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        rec.clear();
        assert!(rec.is_empty());
        assert!(rec.root().is_empty());
        assert!(rec.epoch().is_none());
        assert_eq!(rec.strategy().disposed.len(), 4);

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.created, 4);
    }

    #[test]
    fn strategy_changes_apply_after_clear() {
        let mut src = FakeSource::new(true);
        let mut rec = Reconciler::new(CountingStrategy::default());
        let mut q = jobs();

        rec.update(&mut src, &view(512.0, 512.0), &mut q);
        rec.strategy_mut().defer = true;
        rec.clear();

        let out = rec.update(&mut src, &view(512.0, 512.0), &mut q);
        assert_eq!(out.pending, 4);
        assert_eq!(q.len(), 4);
    }
}
