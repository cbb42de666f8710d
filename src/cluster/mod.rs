//! Greedy screen-space clustering of non-empty tiles.
//!
//! The [`ClusterBuilder`] projects every non-empty tile of the visible area
//! onto the screen, builds a sparse per-pixel histogram of marker counts and
//! repeatedly promotes the densest remaining pixel into a cluster. Pixels
//! near a new cluster are absorbed by it; pixels too close to an existing
//! cluster to seed their own are attached to the nearest cluster at the end.
//!
//! # Examples
//!
//! ```
//! use tilecluster::cluster::{ClusterBuilder, EquirectangularBackend};
//! use tilecluster::{Config, Coordinate, GeoBounds, ItemMarkerTiler, MarkerId, ScreenSize};
//!
//! let mut tiler = ItemMarkerTiler::new();
//! tiler.insert_marker(MarkerId(1), Coordinate::new(10.0, 10.0)).unwrap();
//! tiler.insert_marker(MarkerId(2), Coordinate::new(10.1, 10.1)).unwrap();
//! tiler.insert_marker(MarkerId(3), Coordinate::new(-40.0, 120.0)).unwrap();
//!
//! let mut builder = ClusterBuilder::with_tiler(Config::default(), tiler);
//! let mut backend = EquirectangularBackend::new(GeoBounds::WORLD, ScreenSize::new(720, 360), 3);
//!
//! assert!(builder.update_clusters(&mut backend));
//! assert_eq!(builder.clusters().len(), 2);
//! assert_eq!(builder.clusters()[0].marker_count, 2);
//! ```

mod backend;

pub use backend::{EquirectangularBackend, MapBackend};

use crate::config::{Config, MAX_GROUPING_RADIUS};
use crate::error::{Result, TileClusterError};
use crate::group_state::{GroupState, GroupStateComputer, TriState};
use crate::tile_index::{MAX_LEVEL, TileIndex};
use crate::validation::validate_level;
use crate::tiler::{
    ClickInfo, InteractiveTiler, MarkerId, MarkerTiler, MouseMode, NonEmptyIterator, SortKey,
    ThumbnailTiler, Thumbnail, TilerFlags,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tilecluster_types::coordinate::Coordinate;
use tilecluster_types::screen::{ScreenPoint, ScreenSize};

/// How a cluster is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixmapKind {
    /// A pin anchored at its bottom center
    #[default]
    Marker,
    /// A filled circle showing the marker count
    Circle,
    /// The thumbnail of the representative marker
    Image,
}

/// A group of tiles drawn as one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub tile_indices: Vec<TileIndex>,
    pub marker_count: usize,
    pub marker_selected_count: usize,
    /// South-west corner of the first tile that seeded the cluster
    pub coordinates: Coordinate,
    pub pixel_pos: ScreenPoint,
    pub group_state: GroupState,
    pub representative_markers: FxHashMap<SortKey, MarkerId>,
    pub pixmap_kind: PixmapKind,
    pub pixmap_size: ScreenSize,
    /// Anchor of the pixmap relative to its top-left corner
    pub pixmap_offset: ScreenPoint,
}

impl Cluster {
    fn new(pixel_pos: ScreenPoint, coordinates: Coordinate, bin: PixelBin, radius: u32) -> Self {
        let side = radius.saturating_mul(2);
        let half = i32::try_from(radius).unwrap_or(i32::MAX);
        Self {
            tile_indices: bin.tiles,
            marker_count: bin.count,
            marker_selected_count: 0,
            coordinates,
            pixel_pos,
            group_state: GroupState::NONE,
            representative_markers: FxHashMap::default(),
            pixmap_kind: PixmapKind::default(),
            pixmap_size: ScreenSize::new(side, side),
            pixmap_offset: ScreenPoint::new(half, half),
        }
    }

    fn absorb(&mut self, bin: PixelBin) {
        self.tile_indices.extend(bin.tiles);
        self.marker_count += bin.count;
    }

    /// Replace the pixmap and recompute its anchor.
    pub fn set_pixmap(&mut self, kind: PixmapKind, size: ScreenSize) {
        let w = i32::try_from(size.width).unwrap_or(i32::MAX);
        let h = i32::try_from(size.height).unwrap_or(i32::MAX);
        self.pixmap_kind = kind;
        self.pixmap_size = size;
        self.pixmap_offset = match kind {
            PixmapKind::Marker => ScreenPoint::new(w / 2, (h - 1).max(0)),
            PixmapKind::Circle | PixmapKind::Image => ScreenPoint::new(w / 2, h / 2),
        };
    }
}

/// Tiles and marker count accumulated at one screen pixel.
#[derive(Debug, Default)]
struct PixelBin {
    tiles: Vec<TileIndex>,
    count: usize,
}

/// Builds and owns the cluster list for one map view.
///
/// The builder owns the marker tiler. Mutate the tiler through
/// [`tiler_mut`](Self::tiler_mut) and call [`sync_with_tiler`](Self::sync_with_tiler)
/// afterwards; change notifications of the tiler then schedule a recompute.
pub struct ClusterBuilder<M: MarkerTiler> {
    config: Config,
    tiler: Option<M>,
    clusters: Vec<Cluster>,
    clusters_dirty: bool,
    moving_cluster: bool,
    recluster_pending: bool,
    last_seen_change: u64,
}

impl<M: MarkerTiler> ClusterBuilder<M> {
    /// A builder without a tiler. Recomputes are skipped until one is attached.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tiler: None,
            clusters: Vec::new(),
            clusters_dirty: true,
            moving_cluster: false,
            recluster_pending: false,
            last_seen_change: 0,
        }
    }

    pub fn with_tiler(config: Config, tiler: M) -> Self {
        let mut builder = Self::new(config);
        builder.set_tiler(tiler);
        builder
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        if config != self.config {
            self.config = config;
            self.clusters_dirty = true;
        }
    }

    /// Parse, validate and apply a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the settings are invalid;
    /// the current configuration is kept in that case.
    pub fn apply_json_config(&mut self, json: &str) -> Result<()> {
        let config: Config = serde_json::from_str(json)?;
        config.validate().map_err(TileClusterError::Config)?;
        self.set_config(config);
        Ok(())
    }

    /// Attach a tiler, returning the previous one.
    pub fn set_tiler(&mut self, tiler: M) -> Option<M> {
        self.last_seen_change = tiler.change_count();
        self.clusters_dirty = true;
        self.tiler.replace(tiler)
    }

    pub fn take_tiler(&mut self) -> Option<M> {
        self.clusters.clear();
        self.clusters_dirty = true;
        self.tiler.take()
    }

    pub fn tiler(&self) -> Option<&M> {
        self.tiler.as_ref()
    }

    pub fn tiler_mut(&mut self) -> Option<&mut M> {
        self.tiler.as_mut()
    }

    /// The current cluster list.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// An owned copy of the current cluster list.
    pub fn snapshot(&self) -> Vec<Cluster> {
        self.clusters.clone()
    }

    pub fn clusters_dirty(&self) -> bool {
        self.clusters_dirty
    }

    pub fn set_clusters_dirty(&mut self) {
        self.clusters_dirty = true;
    }

    pub fn is_moving_cluster(&self) -> bool {
        self.moving_cluster
    }

    /// Freeze the cluster list while a cluster is being dragged.
    pub fn set_moving_cluster(&mut self, moving: bool) {
        self.moving_cluster = moving;
    }

    /// Schedule a recompute for the next idle point.
    ///
    /// Repeated requests before [`process_pending`](Self::process_pending)
    /// collapse into one recompute.
    pub fn request_lazy_reclustering(&mut self) {
        if self.recluster_pending {
            return;
        }
        self.clusters_dirty = true;
        self.recluster_pending = true;
    }

    pub fn has_pending_reclustering(&self) -> bool {
        self.recluster_pending
    }

    /// Run the scheduled recompute, if any. Returns whether clusters were rebuilt.
    pub fn process_pending<B: MapBackend>(&mut self, backend: &mut B) -> bool {
        if !self.recluster_pending {
            return false;
        }
        self.recluster_pending = false;
        self.update_clusters(backend)
    }

    /// Schedule a recompute if the tiler reported changes since the last call.
    pub fn sync_with_tiler(&mut self) -> bool {
        let Some(count) = self.tiler.as_ref().map(MarkerTiler::change_count) else {
            return false;
        };
        if count == self.last_seen_change {
            return false;
        }
        self.last_seen_change = count;
        self.request_lazy_reclustering();
        true
    }

    /// Rebuild the cluster list from the non-empty tiles visible in `backend`.
    ///
    /// Skipped (returning `false`) while no tiler is attached, a cluster is
    /// being moved, the backend is not ready or the clusters are not dirty.
    pub fn update_clusters<B: MapBackend>(&mut self, backend: &mut B) -> bool {
        let Some(tiler) = self.tiler.as_mut() else {
            return false;
        };
        if self.moving_cluster || !backend.is_ready() || !self.clusters_dirty {
            return false;
        }
        self.clusters_dirty = false;

        let clusters = build_clusters(tiler, backend, &self.config);
        self.last_seen_change = tiler.change_count();

        log::debug!("Built {} clusters", clusters.len());
        self.clusters = clusters;
        backend.request_redraw();
        true
    }
}

impl<M: ThumbnailTiler> ClusterBuilder<M> {
    /// The marker representing cluster `index` under `sort_key`.
    ///
    /// Computed from the representatives of the cluster's tiles and cached
    /// in the cluster until the next recompute.
    pub fn cluster_representative_marker(
        &mut self,
        index: usize,
        sort_key: SortKey,
    ) -> Option<MarkerId> {
        let tiler = self.tiler.as_mut()?;
        let cluster = self.clusters.get_mut(index)?;
        if let Some(&marker) = cluster.representative_markers.get(&sort_key) {
            return Some(marker);
        }

        let candidates: Vec<MarkerId> = cluster
            .tile_indices
            .iter()
            .filter_map(|tile| tiler.representative_marker(tile, sort_key))
            .collect();
        let best = tiler.best_representative(&candidates, sort_key)?;
        cluster.representative_markers.insert(sort_key, best);
        Some(best)
    }

    /// Thumbnail of the representative marker of cluster `index`.
    ///
    /// Returns `None` while the tiler has no thumbnail ready; the cluster
    /// is then drawn with its fallback pixmap.
    pub fn cluster_thumbnail(&mut self, index: usize) -> Option<Thumbnail> {
        let marker = self.cluster_representative_marker(index, self.config.sort_key)?;
        let side = self.config.thumbnail_size;
        let thumbnail = self.tiler.as_mut()?.thumbnail(marker, ScreenSize::new(side, side))?;

        if let Some(cluster) = self.clusters.get_mut(index) {
            cluster.set_pixmap(
                PixmapKind::Image,
                ScreenSize::new(thumbnail.width, thumbnail.height),
            );
        }
        Some(thumbnail)
    }
}

impl<M: InteractiveTiler> ClusterBuilder<M> {
    /// Forward a click on the given clusters to the tiler.
    pub fn clusters_clicked(&mut self, cluster_indices: &[usize], mouse_mode: MouseMode) {
        let Some(tiler) = self.tiler.as_mut() else {
            return;
        };

        let mut tile_indices = Vec::new();
        let mut computer = GroupStateComputer::new();
        for cluster in cluster_indices.iter().filter_map(|&i| self.clusters.get(i)) {
            tile_indices.extend(cluster.tile_indices.iter().cloned());
            computer.add_state(cluster.group_state);
        }
        if tile_indices.is_empty() {
            return;
        }

        tiler.on_indices_clicked(&ClickInfo {
            tile_indices,
            group_state: computer.state(),
            mouse_mode,
        });
        self.sync_with_tiler();
    }

    /// Cluster `index` was dropped at `target`.
    ///
    /// An unselected cluster moves its own markers; a (partially) selected
    /// cluster moves every selected marker. Returns `false` if the tiler
    /// does not allow moving markers.
    pub fn cluster_moved(&mut self, index: usize, target: Coordinate) -> bool {
        self.moving_cluster = false;
        let Some(tiler) = self.tiler.as_mut() else {
            return false;
        };
        if !tiler.tiler_flags().contains(TilerFlags::MOVABLE) {
            log::warn!("Ignoring move of cluster {}: markers are not movable", index);
            return false;
        }
        let Some(cluster) = self.clusters.get(index) else {
            return false;
        };

        let moved = if cluster.group_state.selected() == TriState::None {
            cluster.tile_indices.clone()
        } else {
            Vec::new()
        };
        tiler.on_indices_moved(&moved, target);

        self.sync_with_tiler();
        self.request_lazy_reclustering();
        true
    }
}

fn pixel_at(key: usize, width: usize) -> ScreenPoint {
    ScreenPoint::new((key % width) as i32, (key / width) as i32)
}

fn build_clusters<M: MarkerTiler, B: MapBackend>(
    tiler: &mut M,
    backend: &B,
    config: &Config,
) -> Vec<Cluster> {
    // fields are public, so an unvalidated config may still arrive here
    let radius = config.grouping_radius().min(MAX_GROUPING_RADIUS);
    let grid_size = 4 * i64::from(radius);
    let too_close = (grid_size / 2) * (grid_size / 2);
    let eat_radius = i32::try_from(grid_size / 4).unwrap_or(i32::MAX);

    let (mut bounds, level) = backend.visible_bounds_and_level();
    let level = validate_level(level).unwrap_or_else(|e| {
        log::warn!("{}, using level {}", e, MAX_LEVEL);
        MAX_LEVEL
    });
    bounds.retain(|b| {
        let usable = b.south() < b.north() && b.west() < b.east();
        if !usable {
            log::warn!("Skipping degenerate view bounds {:?}", b);
        }
        usable
    });

    for b in &bounds {
        tiler.prepare_tiles(b, level);
    }

    let screen = backend.screen_size();
    let width = screen.width as usize;
    let height = screen.height as i32;

    // sparse histogram keyed by x + y * width
    let mut grid: BTreeMap<usize, PixelBin> = BTreeMap::new();
    let mut iter = NonEmptyIterator::with_bounds(tiler, level, &bounds);
    while let Some(index) = iter.next() {
        let count = iter.tiler().marker_count(&index);
        let Some(point) = backend.project_to_screen(&index.to_coordinates()) else {
            continue;
        };
        if !screen.contains(&point) {
            continue;
        }
        let bin = grid
            .entry(point.x as usize + point.y as usize * width)
            .or_default();
        bin.tiles.push(index);
        bin.count += count;
    }

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut leftovers: Vec<(ScreenPoint, PixelBin)> = Vec::new();

    loop {
        let mut best: Option<(usize, usize)> = None;
        let mut too_close_keys = Vec::new();

        for (&key, bin) in &grid {
            if bin.count <= best.map_or(0, |(_, count)| count) {
                continue;
            }
            let point = pixel_at(key, width);
            if clusters
                .iter()
                .any(|c| c.pixel_pos.squared_distance(&point) < too_close)
            {
                too_close_keys.push(key);
            } else {
                best = Some((key, bin.count));
            }
        }

        for key in too_close_keys {
            if let Some(bin) = grid.remove(&key) {
                leftovers.push((pixel_at(key, width), bin));
            }
        }

        let Some((key, _)) = best else {
            break;
        };
        let Some(seed) = grid.remove(&key) else {
            break;
        };
        let Some(coordinates) = seed.tiles.first().map(TileIndex::to_coordinates) else {
            continue;
        };
        let position = pixel_at(key, width);
        let mut cluster = Cluster::new(position, coordinates, seed, radius);

        let max_x = i32::try_from(width).unwrap_or(i32::MAX) - 1;
        let x_range = position.x.saturating_sub(eat_radius).max(0)
            ..=position.x.saturating_add(eat_radius).min(max_x);
        for x in x_range {
            let y_range = position.y.saturating_sub(eat_radius).max(0)
                ..=position.y.saturating_add(eat_radius).min(height - 1);
            for y in y_range {
                if let Some(bin) = grid.remove(&(x as usize + y as usize * width)) {
                    cluster.absorb(bin);
                }
            }
        }

        clusters.push(cluster);
    }

    for (point, bin) in leftovers {
        let nearest = clusters
            .iter()
            .enumerate()
            .map(|(i, c)| (c.pixel_pos.squared_distance(&point), i))
            .fold(None, |best: Option<(i64, usize)>, (d, i)| match best {
                Some((best_d, _)) if best_d <= d => best,
                _ => Some((d, i)),
            });
        if let Some((_, i)) = nearest {
            clusters[i].absorb(bin);
        }
    }

    for cluster in &mut clusters {
        let mut computer = GroupStateComputer::new();
        let mut selected = 0;
        for tile in &cluster.tile_indices {
            computer.add_state(tiler.group_state(tile));
            selected += tiler.selected_count(tile);
        }
        cluster.group_state = computer.state();
        cluster.marker_selected_count = selected;
        cluster.pixmap_kind = if config.show_thumbnails {
            PixmapKind::Image
        } else if cluster.marker_count == 1 {
            PixmapKind::Marker
        } else {
            PixmapKind::Circle
        };
    }

    clusters
}
