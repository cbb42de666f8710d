//! In-memory marker tiler over an owned item store.

use super::{
    ClickInfo, InteractiveTiler, MarkerId, MarkerTiler, MouseMode, SortKey, ThumbnailTiler,
    Thumbnail, Tile, TileTree, TilerFlags,
};
use crate::error::{Result, TileClusterError};
use crate::group_state::{GroupState, TriState};
use crate::tile_index::{MAX_LEVEL, TileIndex};
use crate::validation::{validate_bounds, validate_coordinate};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use tilecluster_types::bounds::GeoBounds;
use tilecluster_types::coordinate::Coordinate;
use tilecluster_types::screen::ScreenSize;

/// Produces the thumbnail of an item, or `None` while it is not available.
pub type ThumbnailProvider = Box<dyn FnMut(&MarkerItem, ScreenSize) -> Option<Thumbnail>>;

/// A geotagged item known to the tiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerItem {
    pub id: MarkerId,
    /// Items without coordinates are stored but never placed in the grid.
    pub coordinates: Option<Coordinate>,
    #[serde(default)]
    pub selected: bool,
    /// Creation time used by the age-based sort keys.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub rating: u8,
}

impl MarkerItem {
    pub fn new(id: MarkerId, coordinates: Coordinate) -> Self {
        Self {
            id,
            coordinates: Some(coordinates),
            selected: false,
            timestamp: 0,
            rating: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

/// Payload of one tile: the markers inside it and how many are selected.
#[derive(Debug, Clone, Default)]
pub struct ItemTile {
    markers: Vec<MarkerId>,
    selected_count: usize,
}

impl ItemTile {
    pub fn markers(&self) -> &[MarkerId] {
        &self.markers
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    fn push(&mut self, id: MarkerId, selected: bool) {
        self.markers.push(id);
        if selected {
            self.selected_count += 1;
        }
    }

    fn remove(&mut self, id: MarkerId, selected: bool) {
        if let Some(pos) = self.markers.iter().position(|&m| m == id) {
            self.markers.remove(pos);
            if selected {
                debug_assert!(self.selected_count > 0, "selected count underflow");
                self.selected_count = self.selected_count.saturating_sub(1);
            }
        }
    }
}

/// Marker tiler backed by an in-memory item store.
///
/// While the tree is clean, every mutation is applied incrementally to the
/// tiles along the marker's path and produces one change notification.
/// While it is dirty, mutations only touch the store; the tree is rebuilt on
/// the next access.
///
/// Tiles are split lazily: a tile distributes its markers to its children the
/// first time a deeper tile below it is requested.
///
/// # Examples
///
/// ```
/// use tilecluster::{Coordinate, ItemMarkerTiler, MarkerId, MarkerTiler, TileIndex};
///
/// let mut tiler = ItemMarkerTiler::new();
/// tiler.insert_marker(MarkerId(1), Coordinate::new(52.5, 13.4)).unwrap();
/// tiler.insert_marker(MarkerId(2), Coordinate::new(52.6, 13.3)).unwrap();
///
/// let tile = TileIndex::from_coordinates(&Coordinate::new(52.5, 13.4), 1);
/// assert_eq!(tiler.marker_count(&tile), 2);
/// ```
pub struct ItemMarkerTiler {
    items: BTreeMap<MarkerId, MarkerItem>,
    tree: TileTree<ItemTile>,
    flags: TilerFlags,
    active: bool,
    positive_filter: Option<FxHashSet<MarkerId>>,
    region_selection: Option<GeoBounds>,
    thumbnail_provider: Option<ThumbnailProvider>,
}

impl Default for ItemMarkerTiler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ItemMarkerTiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemMarkerTiler")
            .field("items", &self.items.len())
            .field("dirty", &self.tree.is_dirty())
            .field("flags", &self.flags)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl ItemMarkerTiler {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            tree: TileTree::new(),
            flags: TilerFlags::empty(),
            active: false,
            positive_filter: None,
            region_selection: None,
            thumbnail_provider: None,
        }
    }

    /// Build a tiler over pre-existing items. The tree is generated on first access.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids or invalid coordinates.
    pub fn from_items(items: impl IntoIterator<Item = MarkerItem>) -> Result<Self> {
        let mut tiler = Self::new();
        tiler.tree.set_dirty(true);
        for item in items {
            tiler.insert_item(item)?;
        }
        Ok(tiler)
    }

    pub fn with_thumbnail_provider(
        mut self,
        provider: impl FnMut(&MarkerItem, ScreenSize) -> Option<Thumbnail> + 'static,
    ) -> Self {
        self.thumbnail_provider = Some(Box::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: MarkerId) -> Option<&MarkerItem> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &MarkerItem> {
        self.items.values()
    }

    pub fn insert_marker(&mut self, id: MarkerId, coordinates: Coordinate) -> Result<()> {
        self.insert_item(MarkerItem::new(id, coordinates))
    }

    /// Add an item to the store and sort it into the grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already present or the coordinates are invalid.
    pub fn insert_item(&mut self, item: MarkerItem) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(TileClusterError::InvalidInput(format!(
                "marker {} already exists",
                item.id
            )));
        }
        if let Some(coordinates) = &item.coordinates {
            validate_coordinate(coordinates)?;
        }

        let id = item.id;
        self.items.insert(id, item);

        if !self.tree.is_dirty() {
            self.add_to_grid(id);
            self.tree.notify_changed();
        }
        Ok(())
    }

    pub fn remove_marker(&mut self, id: MarkerId) -> Result<MarkerItem> {
        if !self.tree.is_dirty() {
            self.remove_from_grid(id);
        }
        let item = self
            .items
            .remove(&id)
            .ok_or(TileClusterError::UnknownMarker(id))?;
        if let Some(filter) = &mut self.positive_filter {
            filter.remove(&id);
        }
        if !self.tree.is_dirty() {
            self.tree.notify_changed();
        }
        Ok(item)
    }

    /// Move a marker to new coordinates.
    pub fn move_marker(&mut self, id: MarkerId, coordinates: Coordinate) -> Result<()> {
        validate_coordinate(&coordinates)?;
        self.relocate(id, coordinates)?;
        if !self.tree.is_dirty() {
            self.tree.notify_changed();
        }
        Ok(())
    }

    pub fn set_selected(&mut self, id: MarkerId, selected: bool) -> Result<()> {
        if self.apply_selection(id, selected)? && !self.tree.is_dirty() {
            self.tree.notify_changed();
        }
        Ok(())
    }

    /// Select or deselect every item.
    pub fn set_all_selected(&mut self, selected: bool) {
        let ids: Vec<MarkerId> = self.items.keys().copied().collect();
        let mut changed = false;
        for id in ids {
            // ids come from the store, the lookup cannot fail
            changed |= self.apply_selection(id, selected).unwrap_or(false);
        }
        if changed && !self.tree.is_dirty() {
            self.tree.notify_changed();
        }
    }

    pub fn selected_ids(&self) -> Vec<MarkerId> {
        self.items
            .values()
            .filter(|item| item.selected)
            .map(|item| item.id)
            .collect()
    }

    pub fn set_movable(&mut self, movable: bool) {
        self.flags.set(TilerFlags::MOVABLE, movable);
    }

    /// Restrict the "filtered positive" state to `ids`, or clear the filter.
    pub fn set_positive_filter(&mut self, ids: Option<FxHashSet<MarkerId>>) {
        self.positive_filter = ids;
        self.tree.notify_changed();
    }

    pub fn positive_filter(&self) -> Option<&FxHashSet<MarkerId>> {
        self.positive_filter.as_ref()
    }

    /// Mark markers inside `region` as region-selected, or clear the region.
    ///
    /// The region may cross the ±180° meridian (east < west).
    ///
    /// # Errors
    ///
    /// Returns an error if a corner is not a valid coordinate or the south
    /// edge lies north of the north edge; the previous region is kept then.
    pub fn set_region_selection(&mut self, region: Option<GeoBounds>) -> Result<()> {
        if let Some(region) = &region {
            validate_bounds(region)?;
        }
        self.region_selection = region;
        self.tree.notify_changed();
        Ok(())
    }

    pub fn region_selection(&self) -> Option<&GeoBounds> {
        self.region_selection.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Discard the tiles; they are rebuilt from the store on the next access.
    pub fn reset(&mut self) {
        log::debug!("Item store reset, invalidating {} markers", self.items.len());
        self.tree.set_dirty(true);
    }

    /// Item data changed in a way that may affect tile membership.
    pub fn mark_data_changed(&mut self) {
        let was_dirty = self.tree.is_dirty();
        // a clean tree already notifies when it turns dirty
        self.tree.set_dirty(true);
        if was_dirty && self.active {
            self.tree.notify_changed();
        }
    }

    /// A thumbnail that was previously unavailable has been produced.
    pub fn notify_thumbnail_available(&mut self, id: MarkerId) {
        log::debug!("Thumbnail available for marker {}", id);
        self.tree.notify_changed();
    }

    pub fn subscribe(&mut self, listener: impl FnMut() + 'static) {
        self.tree.subscribe(listener);
    }

    /// Markers inside the tile at `index`.
    pub fn marker_ids(&mut self, index: &TileIndex) -> Vec<MarkerId> {
        self.tile(index, true)
            .map(|tile| tile.data().markers.clone())
            .unwrap_or_default()
    }

    /// Look up the tile at `index`, splitting tiles along the way.
    ///
    /// With `stop_if_empty`, a missing tile yields `None`; otherwise missing
    /// tiles are created empty.
    pub fn tile(&mut self, index: &TileIndex, stop_if_empty: bool) -> Option<&Tile<ItemTile>> {
        assert!(
            index.index_count() <= usize::from(MAX_LEVEL) + 1,
            "tile index {} too deep",
            index
        );
        self.ensure_fresh();
        let tile = descend(self.tree.root_mut(), &self.items, index, stop_if_empty)?;
        Some(&*tile)
    }

    fn ensure_fresh(&mut self) {
        if self.tree.is_dirty() {
            self.regenerate_tiles();
        }
    }

    fn add_to_grid(&mut self, id: MarkerId) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        let Some(coordinates) = item.coordinates else {
            return;
        };
        let selected = item.selected;
        let path = TileIndex::from_coordinates(&coordinates, MAX_LEVEL);

        let mut tile = self.tree.root_mut();
        for level in 0..=MAX_LEVEL {
            tile.data_mut().push(id, selected);

            if tile.children_empty() {
                break;
            }

            let next = tile.get_or_insert_child(path.linear_index(level));
            if level == MAX_LEVEL {
                next.data_mut().push(id, selected);
            }
            tile = next;
        }
    }

    fn remove_from_grid(&mut self, id: MarkerId) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        let Some(coordinates) = item.coordinates else {
            return;
        };
        let path = TileIndex::from_coordinates(&coordinates, MAX_LEVEL);
        remove_along_path(self.tree.root_mut(), path.as_slice(), id, item.selected);
    }

    fn relocate(&mut self, id: MarkerId, coordinates: Coordinate) -> Result<()> {
        if !self.items.contains_key(&id) {
            return Err(TileClusterError::UnknownMarker(id));
        }
        let clean = !self.tree.is_dirty();
        if clean {
            self.remove_from_grid(id);
        }
        if let Some(item) = self.items.get_mut(&id) {
            item.coordinates = Some(coordinates);
        }
        if clean {
            self.add_to_grid(id);
        }
        Ok(())
    }

    /// Returns whether the selection actually changed.
    fn apply_selection(&mut self, id: MarkerId, selected: bool) -> Result<bool> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(TileClusterError::UnknownMarker(id))?;
        if item.selected == selected {
            return Ok(false);
        }
        item.selected = selected;

        if self.tree.is_dirty() {
            return Ok(true);
        }
        let Some(coordinates) = item.coordinates else {
            return Ok(true);
        };

        let path = TileIndex::from_coordinates(&coordinates, MAX_LEVEL);
        let mut tile = self.tree.root_mut();
        for &child in path.as_slice() {
            adjust_selected(tile.data_mut(), selected);
            match tile.child_mut(child) {
                Some(next) => tile = next,
                None => return Ok(true),
            }
        }
        adjust_selected(tile.data_mut(), selected);
        Ok(true)
    }

    fn state_of(&self, markers: &[MarkerId], selected_count: usize) -> GroupState {
        let total = markers.len();
        let selected = TriState::from_counts(selected_count, total);

        let filtered = match &self.positive_filter {
            Some(filter) => {
                TriState::from_counts(markers.iter().filter(|id| filter.contains(id)).count(), total)
            }
            None => TriState::None,
        };

        let region = match &self.region_selection {
            Some(region) => {
                let parts =
                    GeoBounds::normalized(region.south(), region.west(), region.north(), region.east());
                let inside = markers
                    .iter()
                    .filter_map(|id| self.items.get(id)?.coordinates)
                    .filter(|c| parts.iter().any(|part| part.contains(c)))
                    .count();
                TriState::from_counts(inside, total)
            }
            None => TriState::None,
        };

        GroupState::from_parts(selected, filtered, region)
    }

    fn collect_markers(&mut self, tile_indices: &[TileIndex]) -> Vec<MarkerId> {
        let mut seen = FxHashSet::default();
        let mut markers = Vec::new();
        for index in tile_indices {
            for id in self.marker_ids(index) {
                if seen.insert(id) {
                    markers.push(id);
                }
            }
        }
        markers
    }
}

fn adjust_selected(tile: &mut ItemTile, selected: bool) {
    if selected {
        tile.selected_count += 1;
        debug_assert!(tile.selected_count <= tile.markers.len());
    } else {
        debug_assert!(tile.selected_count > 0, "selected count underflow");
        tile.selected_count = tile.selected_count.saturating_sub(1);
    }
}

/// Walk to the tile at `index`, distributing markers into children on the way.
fn descend<'t>(
    mut tile: &'t mut Tile<ItemTile>,
    items: &BTreeMap<MarkerId, MarkerItem>,
    index: &TileIndex,
    stop_if_empty: bool,
) -> Option<&'t mut Tile<ItemTile>> {
    for (level, &child_index) in index.as_slice().iter().enumerate() {
        if tile.children_empty() && !tile.data().markers.is_empty() {
            split(tile, items, level as u8);
        }

        if tile.child(child_index).is_none() {
            if stop_if_empty {
                return None;
            }
            tile.add_child(child_index, Tile::default());
        }
        tile = tile.child_mut(child_index)?;
    }
    Some(tile)
}

fn split(tile: &mut Tile<ItemTile>, items: &BTreeMap<MarkerId, MarkerItem>, level: u8) {
    let markers = tile.data().markers.clone();
    for id in markers {
        let Some(item) = items.get(&id) else {
            continue;
        };
        let Some(coordinates) = item.coordinates else {
            continue;
        };
        let Some(child_index) = TileIndex::from_coordinates(&coordinates, level).last_index()
        else {
            continue;
        };
        tile.get_or_insert_child(child_index)
            .data_mut()
            .push(id, item.selected);
    }
}

/// Remove `id` from `tile` and the existing tiles along `path`, deleting
/// tiles that become empty.
fn remove_along_path(tile: &mut Tile<ItemTile>, path: &[u8], id: MarkerId, selected: bool) {
    tile.data_mut().remove(id, selected);

    let Some((&first, rest)) = path.split_first() else {
        return;
    };
    let Some(child) = tile.child_mut(first) else {
        return;
    };
    remove_along_path(child, rest, id, selected);
    let child_empty = child.data().markers.is_empty();
    if child_empty {
        tile.remove_child(first);
    }
}

impl MarkerTiler for ItemMarkerTiler {
    type Payload = ItemTile;

    fn tree(&self) -> &TileTree<ItemTile> {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut TileTree<ItemTile> {
        &mut self.tree
    }

    fn regenerate_tiles(&mut self) {
        log::debug!("Regenerating tiles for {} markers", self.items.len());
        self.tree.reset_root();
        self.tree.set_dirty(false);

        let ids: Vec<MarkerId> = self.items.keys().copied().collect();
        for id in ids {
            self.add_to_grid(id);
        }
    }

    fn prepare_tiles(&mut self, _bounds: &GeoBounds, _level: u8) {}

    fn marker_count(&mut self, index: &TileIndex) -> usize {
        self.tile(index, true)
            .map_or(0, |tile| tile.data().marker_count())
    }

    fn selected_count(&mut self, index: &TileIndex) -> usize {
        self.tile(index, true)
            .map_or(0, |tile| tile.data().selected_count())
    }

    fn group_state(&mut self, index: &TileIndex) -> GroupState {
        let Some(tile) = self.tile(index, true) else {
            return GroupState::NONE;
        };
        let markers = tile.data().markers.clone();
        let selected_count = tile.data().selected_count;
        self.state_of(&markers, selected_count)
    }

    fn global_group_state(&self) -> GroupState {
        let markers: Vec<MarkerId> = self
            .items
            .values()
            .filter(|item| item.coordinates.is_some())
            .map(|item| item.id)
            .collect();
        let selected = markers
            .iter()
            .filter(|id| self.items.get(id).is_some_and(|item| item.selected))
            .count();
        self.state_of(&markers, selected)
    }

    fn tiler_flags(&self) -> TilerFlags {
        self.flags
    }
}

impl ThumbnailTiler for ItemMarkerTiler {
    fn representative_marker(&mut self, index: &TileIndex, sort_key: SortKey) -> Option<MarkerId> {
        let markers = self.marker_ids(index);
        self.best_representative(&markers, sort_key)
    }

    fn best_representative(&self, candidates: &[MarkerId], sort_key: SortKey) -> Option<MarkerId> {
        let items = candidates.iter().filter_map(|id| self.items.get(id));
        let best = match sort_key {
            SortKey::OldestFirst => items.min_by_key(|item| (item.timestamp, item.id)),
            SortKey::YoungestFirst => items.min_by_key(|item| (Reverse(item.timestamp), item.id)),
            SortKey::HighestRatedFirst => items.min_by_key(|item| (Reverse(item.rating), item.id)),
        };
        best.map(|item| item.id)
    }

    fn thumbnail(&mut self, marker: MarkerId, size: ScreenSize) -> Option<Thumbnail> {
        let item = self.items.get(&marker)?;
        let provider = self.thumbnail_provider.as_mut()?;
        provider(item, size)
    }
}

impl InteractiveTiler for ItemMarkerTiler {
    fn on_indices_clicked(&mut self, click: &ClickInfo) {
        let clicked = self.collect_markers(&click.tile_indices);

        match click.mouse_mode {
            MouseMode::SelectThumbnail => {
                let do_select = click.group_state.selected() != TriState::All;
                let mut changed = false;
                for id in clicked {
                    changed |= self.apply_selection(id, do_select).unwrap_or(false);
                }
                if changed && !self.tree.is_dirty() {
                    self.tree.notify_changed();
                }
            }
            MouseMode::Filter => {
                log::debug!("Filtering to {} clicked markers", clicked.len());
                self.set_positive_filter(Some(clicked.into_iter().collect()));
            }
            MouseMode::Pan | MouseMode::RegionSelection => {}
        }
    }

    fn on_indices_moved(&mut self, tile_indices: &[TileIndex], target: Coordinate) {
        if validate_coordinate(&target).is_err() {
            log::warn!("Ignoring move to invalid target {}", target);
            return;
        }

        let moved = if tile_indices.is_empty() {
            self.selected_ids()
        } else {
            self.collect_markers(tile_indices)
        };

        for &id in &moved {
            if let Err(e) = self.relocate(id, target) {
                log::warn!("Failed to move marker {}: {}", id, e);
            }
        }
        if !moved.is_empty() && !self.tree.is_dirty() {
            self.tree.notify_changed();
        }
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
