//! Sparse tile tree and the marker tiler capability traits.
//!
//! A marker tiler sorts markers into the hierarchical grid addressed by
//! [`TileIndex`] and answers count queries for any tile. The tree is stored
//! sparsely: a tile allocates its 100 child slots only when the first child
//! is added, and tiles without markers are never created.
//!
//! Tilers expose their functionality through three traits:
//!
//! - [`MarkerTiler`]: mandatory core operations (counts, group states, lazy
//!   regeneration, dirty tracking)
//! - [`ThumbnailTiler`]: representative markers and thumbnails, only needed
//!   when clusters are displayed as thumbnails
//! - [`InteractiveTiler`]: optional click / move callbacks

mod item_tiler;
mod iterator;

pub use item_tiler::{ItemMarkerTiler, ItemTile, MarkerItem, ThumbnailProvider};
pub use iterator::NonEmptyIterator;

use crate::group_state::GroupState;
use crate::tile_index::{CHILD_COUNT, TileIndex};
use bitflags::bitflags;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tilecluster_types::bounds::GeoBounds;
use tilecluster_types::coordinate::Coordinate;
use tilecluster_types::screen::ScreenSize;

/// Opaque identifier of a marker in a tiler's item store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Capabilities advertised by a tiler.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TilerFlags: u8 {
        /// Markers may be dragged to new positions.
        const MOVABLE = 0b0000_0001;
    }
}

/// Criterion used to pick the marker that represents a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    OldestFirst,
    YoungestFirst,
    HighestRatedFirst,
}

/// Interaction mode active when clusters are clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseMode {
    #[default]
    Pan,
    SelectThumbnail,
    Filter,
    RegionSelection,
}

/// Details of a click on one or more clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickInfo {
    /// Tiles belonging to the clicked clusters
    pub tile_indices: Vec<TileIndex>,
    /// Aggregated state of the clicked clusters
    pub group_state: GroupState,
    pub mouse_mode: MouseMode,
}

/// Decoded thumbnail pixels (RGBA, row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Bytes,
}

/// A node of the sparse tile tree carrying a payload of type `T`.
///
/// Each tile exclusively owns its children. Dropping a tile drops its whole
/// subtree.
pub struct Tile<T> {
    data: T,
    children: Option<Box<[Option<Box<Tile<T>>>]>>,
    child_count: usize,
}

impl<T: Default> Default for Tile<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Tile<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("data", &self.data)
            .field("child_count", &self.child_count)
            .finish()
    }
}

impl<T> Tile<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            children: None,
            child_count: 0,
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// True if the tile has no live children.
    pub fn children_empty(&self) -> bool {
        self.child_count == 0
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    pub fn child(&self, index: u8) -> Option<&Tile<T>> {
        self.children
            .as_ref()?
            .get(usize::from(index))?
            .as_deref()
    }

    pub fn child_mut(&mut self, index: u8) -> Option<&mut Tile<T>> {
        self.children
            .as_mut()?
            .get_mut(usize::from(index))?
            .as_deref_mut()
    }

    /// Insert `tile` at `index`, returning the tile previously stored there.
    ///
    /// The child slot array is allocated on first use.
    pub fn add_child(&mut self, index: u8, tile: Tile<T>) -> Option<Box<Tile<T>>> {
        assert!(
            usize::from(index) < CHILD_COUNT,
            "child index {} out of range",
            index
        );
        let slots = self
            .children
            .get_or_insert_with(|| (0..CHILD_COUNT).map(|_| None).collect());
        let previous = slots[usize::from(index)].replace(Box::new(tile));
        if previous.is_none() {
            self.child_count += 1;
        }
        previous
    }

    /// Detach and return the child at `index`.
    ///
    /// The slot array is released once the last child is gone.
    pub fn remove_child(&mut self, index: u8) -> Option<Box<Tile<T>>> {
        let slots = self.children.as_mut()?;
        let removed = slots.get_mut(usize::from(index))?.take();
        if removed.is_some() {
            self.child_count -= 1;
            if self.child_count == 0 {
                self.children = None;
            }
        }
        removed
    }

    /// Iterate over `(linear index, child)` pairs in index order.
    pub fn children(&self) -> impl Iterator<Item = (u8, &Tile<T>)> {
        self.children
            .iter()
            .flat_map(|slots| slots.iter().enumerate())
            .filter_map(|(i, slot)| slot.as_deref().map(|tile| (i as u8, tile)))
    }
}

impl<T: Default> Tile<T> {
    /// Return the child at `index`, creating an empty one if necessary.
    pub fn get_or_insert_child(&mut self, index: u8) -> &mut Tile<T> {
        if self.child(index).is_none() {
            self.add_child(index, Tile::default());
        }
        self.child_mut(index)
            .unwrap_or_else(|| unreachable!("child {} was just inserted", index))
    }
}

/// Counter plus listeners for "tiles or selection changed" notifications.
#[derive(Default)]
pub struct ChangeSignal {
    count: u64,
    listeners: Vec<Box<dyn FnMut()>>,
}

impl fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("count", &self.count)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ChangeSignal {
    pub fn emit(&mut self) {
        self.count += 1;
        for listener in &mut self.listeners {
            listener();
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn subscribe(&mut self, listener: impl FnMut() + 'static) {
        self.listeners.push(Box::new(listener));
    }
}

/// Root container of the sparse tile tree.
///
/// Tracks whether the tiles are stale ("dirty") and must be regenerated
/// before the next read.
#[derive(Debug)]
pub struct TileTree<T> {
    root: Box<Tile<T>>,
    dirty: bool,
    changed: ChangeSignal,
}

impl<T: Default> Default for TileTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> TileTree<T> {
    pub fn new() -> Self {
        Self {
            root: Box::default(),
            dirty: false,
            changed: ChangeSignal::default(),
        }
    }

    /// Discard every tile and start over with an empty root.
    pub fn reset_root(&mut self) {
        self.root = Box::default();
    }
}

impl<T> TileTree<T> {
    /// The cached root, without regenerating stale tiles.
    ///
    /// Use [`MarkerTiler::root_tile`] to get a root that is guaranteed fresh.
    pub fn root(&self) -> &Tile<T> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Tile<T> {
        &mut self.root
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the tiles stale or fresh.
    ///
    /// Only the clean-to-dirty transition notifies listeners, so a burst of
    /// invalidations yields a single notification.
    pub fn set_dirty(&mut self, dirty: bool) {
        if dirty && !self.dirty {
            self.dirty = true;
            self.changed.emit();
        } else {
            self.dirty = dirty;
        }
    }

    /// Notify listeners about an incremental change of tiles or selection.
    pub fn notify_changed(&mut self) {
        self.changed.emit();
    }

    /// Number of notifications emitted so far.
    pub fn change_count(&self) -> u64 {
        self.changed.count()
    }

    pub fn subscribe(&mut self, listener: impl FnMut() + 'static) {
        self.changed.subscribe(listener);
    }

    /// Walk down to the tile addressed by `index`, if it exists.
    pub fn tile(&self, index: &TileIndex) -> Option<&Tile<T>> {
        index
            .as_slice()
            .iter()
            .try_fold(self.root.as_ref(), |tile, &i| tile.child(i))
    }

    pub fn tile_mut(&mut self, index: &TileIndex) -> Option<&mut Tile<T>> {
        let mut tile = self.root.as_mut();
        for &i in index.as_slice() {
            tile = tile.child_mut(i)?;
        }
        Some(tile)
    }
}

/// Mandatory core operations of a marker-count source.
///
/// Count queries take `&mut self` because they may regenerate stale tiles
/// or split tiles lazily.
pub trait MarkerTiler {
    /// Per-tile payload stored in the tree.
    type Payload: Default;

    fn tree(&self) -> &TileTree<Self::Payload>;

    fn tree_mut(&mut self) -> &mut TileTree<Self::Payload>;

    /// Rebuild the tree from the underlying item store.
    ///
    /// Implementations must leave the tree clean.
    fn regenerate_tiles(&mut self);

    /// Give the tiler a chance to populate counts for `bounds` at `level`
    /// before they are queried.
    fn prepare_tiles(&mut self, bounds: &GeoBounds, level: u8);

    fn marker_count(&mut self, index: &TileIndex) -> usize;

    fn selected_count(&mut self, index: &TileIndex) -> usize;

    fn group_state(&mut self, index: &TileIndex) -> GroupState;

    /// State of all markers known to the tiler.
    fn global_group_state(&self) -> GroupState {
        GroupState::NONE
    }

    fn tiler_flags(&self) -> TilerFlags {
        TilerFlags::empty()
    }

    /// The root tile, regenerating the tree first if it is dirty.
    fn root_tile(&mut self) -> &Tile<Self::Payload> {
        if self.tree().is_dirty() {
            log::debug!("Regenerating dirty tile tree");
            self.regenerate_tiles();
        }
        self.tree().root()
    }

    fn is_dirty(&self) -> bool {
        self.tree().is_dirty()
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.tree_mut().set_dirty(dirty);
    }

    fn change_count(&self) -> u64 {
        self.tree().change_count()
    }
}

/// Operations needed only when clusters are displayed as thumbnails.
pub trait ThumbnailTiler: MarkerTiler {
    /// The marker that best represents the tile under `sort_key`.
    fn representative_marker(&mut self, index: &TileIndex, sort_key: SortKey) -> Option<MarkerId>;

    /// Pick the best representative among `candidates`.
    fn best_representative(&self, candidates: &[MarkerId], sort_key: SortKey) -> Option<MarkerId>;

    /// Thumbnail for `marker`, or `None` if it is not available yet.
    ///
    /// Implementations must not block; a provider that decodes in the
    /// background simply returns `None` and notifies a change later.
    fn thumbnail(&mut self, marker: MarkerId, size: ScreenSize) -> Option<Thumbnail>;
}

/// Optional interaction callbacks.
pub trait InteractiveTiler: MarkerTiler {
    fn on_indices_clicked(&mut self, _click: &ClickInfo) {}

    /// Markers of `tile_indices` were dropped at `target`. An empty list
    /// means all selected markers were moved.
    fn on_indices_moved(&mut self, _tile_indices: &[TileIndex], _target: Coordinate) {}

    fn set_active(&mut self, _active: bool) {}
}
