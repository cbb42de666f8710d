//! Traversal of the non-empty tiles of a marker tiler.

use super::MarkerTiler;
use crate::tile_index::{TILING, TileIndex, checked_level};
use std::collections::VecDeque;
use tilecluster_types::bounds::GeoBounds;

/// Lazily enumerates every tile at a fixed level that holds at least one
/// marker, restricted to one or more index rectangles.
///
/// Empty subtrees are skipped without being descended into, so the cost is
/// bounded by the number of non-empty tiles rather than by the grid size.
/// Tiles are produced in lat-major raster order within each rectangle.
///
/// # Examples
///
/// ```
/// use tilecluster::{Coordinate, ItemMarkerTiler, MarkerId, NonEmptyIterator};
///
/// let mut tiler = ItemMarkerTiler::new();
/// tiler.insert_marker(MarkerId(1), Coordinate::new(50.0, 60.0)).unwrap();
///
/// let tiles: Vec<_> = NonEmptyIterator::new(&mut tiler, 2).collect();
/// assert_eq!(tiles.len(), 1);
/// assert_eq!(tiles[0].index_count(), 3);
/// ```
pub struct NonEmptyIterator<'a, M: MarkerTiler> {
    tiler: &'a mut M,
    level: u8,
    bounds: VecDeque<(TileIndex, TileIndex)>,
    start_index: TileIndex,
    end_index: TileIndex,
    current_index: TileIndex,
    at_start_of_level: bool,
    at_end: bool,
}

impl<'a, M: MarkerTiler> NonEmptyIterator<'a, M> {
    /// Iterate over the whole world at `level`.
    pub fn new(tiler: &'a mut M, level: u8) -> Self {
        let level = checked_level(level);
        let mut start = TileIndex::new();
        let mut end = TileIndex::new();
        for _ in 0..=level {
            start.append_lat_lon_index(0, 0);
            end.append_lat_lon_index(TILING - 1, TILING - 1);
        }
        Self::from_pairs(tiler, level, VecDeque::from([(start, end)]))
    }

    /// Iterate over the index rectangle spanned by `start` and `end`.
    ///
    /// # Panics
    ///
    /// Panics if either index is not at `level`.
    pub fn with_indices(tiler: &'a mut M, level: u8, start: TileIndex, end: TileIndex) -> Self {
        let level = checked_level(level);
        let expected = usize::from(level) + 1;
        assert!(
            start.index_count() == expected && end.index_count() == expected,
            "iterator bounds {} .. {} are not at level {}",
            start,
            end,
            level
        );
        Self::from_pairs(tiler, level, VecDeque::from([(start, end)]))
    }

    /// Iterate over the tiles intersecting any of `bounds`, one rectangle
    /// after another.
    ///
    /// Each rectangle must already be normalized (see
    /// [`GeoBounds::normalized`]); views crossing the ±180° meridian are
    /// passed as two adjoining rectangles.
    ///
    /// # Panics
    ///
    /// Panics if a rectangle's south-west corner is not strictly south and
    /// west of its north-east corner.
    pub fn with_bounds(tiler: &'a mut M, level: u8, bounds: &[GeoBounds]) -> Self {
        let level = checked_level(level);
        let pairs = bounds
            .iter()
            .map(|b| {
                assert!(
                    b.south() < b.north() && b.west() < b.east(),
                    "iterator bounds must be normalized, got {:?}",
                    b
                );
                (
                    TileIndex::from_coordinates(&b.south_west, level),
                    TileIndex::from_coordinates(&b.north_east, level),
                )
            })
            .collect();
        Self::from_pairs(tiler, level, pairs)
    }

    fn from_pairs(tiler: &'a mut M, level: u8, bounds: VecDeque<(TileIndex, TileIndex)>) -> Self {
        let mut iter = Self {
            tiler,
            level,
            bounds,
            start_index: TileIndex::new(),
            end_index: TileIndex::new(),
            current_index: TileIndex::new(),
            at_start_of_level: true,
            at_end: false,
        };
        if iter.initialize_next_bounds() {
            iter.advance();
        }
        iter
    }

    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// The tile the iterator is positioned on. Meaningless once [`at_end`](Self::at_end).
    pub fn current_index(&self) -> &TileIndex {
        &self.current_index
    }

    /// Step to the next non-empty tile and return it.
    pub fn next_index(&mut self) -> Option<&TileIndex> {
        if self.at_end {
            return None;
        }
        self.advance();
        (!self.at_end).then_some(&self.current_index)
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// The underlying tiler, for count queries between steps.
    pub fn tiler(&mut self) -> &mut M {
        self.tiler
    }

    fn initialize_next_bounds(&mut self) -> bool {
        let Some((start, end)) = self.bounds.pop_front() else {
            self.at_end = true;
            return false;
        };
        self.current_index = start.mid(0, 1);
        self.start_index = start;
        self.end_index = end;
        self.at_start_of_level = true;
        true
    }

    /// Per-axis limits `(lat_low, lon_low, lat_high, lon_high)` at `level`.
    ///
    /// A lower limit is taken from the start index only while the current
    /// path agrees with it on that axis for every level above; the upper
    /// limits follow the end index the same way.
    fn limits(&self, level: u8) -> (u8, u8, u8, u8) {
        let on_axis = |bound: &TileIndex, axis: fn(&TileIndex, u8) -> u8| {
            (0..level).all(|l| axis(&self.current_index, l) == axis(bound, l))
        };

        let lat_low = if on_axis(&self.start_index, TileIndex::lat_index) {
            self.start_index.lat_index(level)
        } else {
            0
        };
        let lon_low = if on_axis(&self.start_index, TileIndex::lon_index) {
            self.start_index.lon_index(level)
        } else {
            0
        };
        let lat_high = if on_axis(&self.end_index, TileIndex::lat_index) {
            self.end_index.lat_index(level)
        } else {
            TILING - 1
        };
        let lon_high = if on_axis(&self.end_index, TileIndex::lon_index) {
            self.end_index.lon_index(level)
        } else {
            TILING - 1
        };

        (lat_low, lon_low, lat_high, lon_high)
    }

    fn advance(&mut self) {
        loop {
            let current_level = self.current_index.level();

            if self.at_start_of_level {
                self.at_start_of_level = false;
            } else {
                let (lat_low, lon_low, lat_high, lon_high) = self.limits(current_level);
                let mut lat = self.current_index.lat_index(current_level);
                let mut lon = self.current_index.lon_index(current_level) + 1;

                if lon > lon_high {
                    lon = lon_low;
                    lat += 1;
                    if lat > lat_high {
                        if current_level == 0 {
                            if !self.initialize_next_bounds() {
                                return;
                            }
                        } else {
                            self.current_index.one_up();
                        }
                        continue;
                    }
                }

                self.current_index.one_up();
                self.current_index.append_lat_lon_index(lat, lon);
            }

            if self.tiler.marker_count(&self.current_index) == 0 {
                continue;
            }

            if current_level == self.level {
                return;
            }

            // descend, starting at the clipped lower-left cell of the next level
            let below = current_level + 1;
            let on_start = |axis: fn(&TileIndex, u8) -> u8| {
                (0..=current_level).all(|l| axis(&self.current_index, l) == axis(&self.start_index, l))
            };
            let lat_low = if on_start(TileIndex::lat_index) {
                self.start_index.lat_index(below)
            } else {
                0
            };
            let lon_low = if on_start(TileIndex::lon_index) {
                self.start_index.lon_index(below)
            } else {
                0
            };
            self.current_index.append_lat_lon_index(lat_low, lon_low);
            self.at_start_of_level = true;
        }
    }
}

impl<M: MarkerTiler> Iterator for NonEmptyIterator<'_, M> {
    type Item = TileIndex;

    fn next(&mut self) -> Option<TileIndex> {
        if self.at_end {
            return None;
        }
        let index = self.current_index.clone();
        self.advance();
        Some(index)
    }
}

impl<M: MarkerTiler> std::iter::FusedIterator for NonEmptyIterator<'_, M> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_state::GroupState;
    use crate::tiler::TileTree;
    use rustc_hash::FxHashSet;

    /// Count source backed by an explicit set of non-empty leaf tiles.
    #[derive(Default)]
    struct SetTiler {
        tree: TileTree<()>,
        leaves: Vec<TileIndex>,
        queries: usize,
    }

    impl SetTiler {
        fn with_leaves(leaves: &[&[u8]]) -> Self {
            Self {
                leaves: leaves
                    .iter()
                    .map(|l| TileIndex::from_linear_indices(l).unwrap())
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl MarkerTiler for SetTiler {
        type Payload = ();

        fn tree(&self) -> &TileTree<()> {
            &self.tree
        }

        fn tree_mut(&mut self) -> &mut TileTree<()> {
            &mut self.tree
        }

        fn regenerate_tiles(&mut self) {}

        fn prepare_tiles(&mut self, _bounds: &GeoBounds, _level: u8) {}

        fn marker_count(&mut self, index: &TileIndex) -> usize {
            self.queries += 1;
            let prefix = index.as_slice();
            self.leaves
                .iter()
                .filter(|leaf| leaf.as_slice().starts_with(prefix))
                .count()
        }

        fn selected_count(&mut self, _index: &TileIndex) -> usize {
            0
        }

        fn group_state(&mut self, _index: &TileIndex) -> GroupState {
            GroupState::NONE
        }
    }

    fn idx(path: &[u8]) -> TileIndex {
        TileIndex::from_linear_indices(path).unwrap()
    }

    #[test]
    fn test_empty_tiler_is_at_end() {
        let mut tiler = SetTiler::default();
        let mut iter = NonEmptyIterator::new(&mut tiler, 1);
        assert!(iter.at_end());
        assert!(iter.next().is_none());
        assert!(iter.next_index().is_none());
    }

    #[test]
    fn test_whole_world_raster_order() {
        let mut tiler = SetTiler::with_leaves(&[&[55, 1], &[3, 99], &[3, 7], &[90, 0]]);
        let tiles: Vec<TileIndex> = NonEmptyIterator::new(&mut tiler, 1).collect();
        assert_eq!(
            tiles,
            vec![idx(&[3, 7]), idx(&[3, 99]), idx(&[55, 1]), idx(&[90, 0])]
        );
    }

    #[test]
    fn test_level_zero_yields_parents_once() {
        let mut tiler = SetTiler::with_leaves(&[&[12, 1], &[12, 2], &[40, 0]]);
        let tiles: Vec<TileIndex> = NonEmptyIterator::new(&mut tiler, 0).collect();
        assert_eq!(tiles, vec![idx(&[12]), idx(&[40])]);
    }

    #[test]
    fn test_empty_subtrees_are_not_descended() {
        let mut tiler = SetTiler::with_leaves(&[&[0, 0, 0]]);
        let count = NonEmptyIterator::new(&mut tiler, 2).count();
        assert_eq!(count, 1);
        // 100 top-level lookups plus 100 lookups in each of the two visited subtrees
        assert!(tiler.queries <= 300, "queried {} tiles", tiler.queries);
    }

    #[test]
    fn test_explicit_bounds_clip() {
        // lat rows 1..=2 and lon columns 3..=4 at level 0
        let mut tiler =
            SetTiler::with_leaves(&[&[13], &[14], &[15], &[23], &[24], &[33], &[2], &[12]]);
        let tiles: Vec<TileIndex> =
            NonEmptyIterator::with_indices(&mut tiler, 0, idx(&[13]), idx(&[24])).collect();
        assert_eq!(tiles, vec![idx(&[13]), idx(&[14]), idx(&[23]), idx(&[24])]);
    }

    #[test]
    fn test_explicit_bounds_unaligned_at_deeper_level() {
        // start at cell (lat 1, lon 8) of top tile 0, end at cell (lat 3, lon 1) of top tile 1
        let start = idx(&[0, 18]);
        let end = idx(&[1, 31]);

        let mut leaves: Vec<Vec<u8>> = Vec::new();
        for top in 0..2u8 {
            for cell in 0..100u8 {
                leaves.push(vec![top, cell]);
            }
        }
        let refs: Vec<&[u8]> = leaves.iter().map(Vec::as_slice).collect();
        let mut tiler = SetTiler::with_leaves(&refs);

        let tiles: Vec<TileIndex> =
            NonEmptyIterator::with_indices(&mut tiler, 1, start.clone(), end.clone()).collect();

        let unique: FxHashSet<&TileIndex> = tiles.iter().collect();
        assert_eq!(unique.len(), tiles.len());

        for tile in &tiles {
            // global lat / lon cell coordinates at level 1
            let lat = tile.lat_index(0) * 10 + tile.lat_index(1);
            let lon = tile.lon_index(0) * 10 + tile.lon_index(1);
            assert!((1..=3).contains(&lat), "lat {} outside bounds for {}", lat, tile);
            assert!((8..=11).contains(&lon), "lon {} outside bounds for {}", lon, tile);
        }
        // 3 rows x 4 columns
        assert_eq!(tiles.len(), 12);
        assert_eq!(tiles.first(), Some(&start));
        assert_eq!(tiles.last(), Some(&end));
    }

    #[test]
    fn test_multiple_bounds_visited_in_order() {
        let mut tiler = SetTiler::with_leaves(&[&[5], &[95], &[50]]);
        let bounds = [
            GeoBounds::from_edges(80.0, 10.0, 85.0, 20.0),
            GeoBounds::from_edges(-85.0, 5.0, -80.0, 10.0),
        ];
        let tiles: Vec<TileIndex> = NonEmptyIterator::with_bounds(&mut tiler, 0, &bounds).collect();
        assert_eq!(tiles, vec![idx(&[95]), idx(&[5])]);
    }

    #[test]
    #[should_panic(expected = "not at level")]
    fn test_mismatched_bound_level_panics() {
        let mut tiler = SetTiler::default();
        let _ = NonEmptyIterator::with_indices(&mut tiler, 1, idx(&[1]), idx(&[2, 3]));
    }
}
