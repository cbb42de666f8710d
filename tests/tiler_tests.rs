use tilecluster::{
    Coordinate, GeoBounds, ItemMarkerTiler, MAX_LEVEL, MarkerId, MarkerItem, MarkerTiler,
    NonEmptyIterator, TileIndex, TriState,
};

const COORD_1_2: Coordinate = Coordinate::new(1.0, 2.0);
const COORD_50_60: Coordinate = Coordinate::new(50.0, 60.0);
const COORD_M50_M60: Coordinate = Coordinate::new(-50.0, -60.0);

/// Sum of the marker counts of every tile an iterator visits.
fn count_markers(mut it: NonEmptyIterator<'_, ItemMarkerTiler>) -> usize {
    let mut total = 0;
    while !it.at_end() {
        let index = it.current_index().clone();
        total += it.tiler().marker_count(&index);
        it.next_index();
    }
    total
}

fn count_in_bounds(tiler: &mut ItemMarkerTiler, level: u8, bounds: &[GeoBounds]) -> usize {
    count_markers(NonEmptyIterator::with_bounds(tiler, level, bounds))
}

fn pair(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> GeoBounds {
    GeoBounds::new(Coordinate::new(lat1, lon1), Coordinate::new(lat2, lon2))
}

#[test]
fn test_indices() {
    for l in 0..=MAX_LEVEL {
        assert_eq!(TileIndex::from_coordinates(&COORD_1_2, l).level(), l);
    }
}

#[test]
fn test_add_markers() {
    let mut tiler = ItemMarkerTiler::new();

    // there should be no tiles yet
    for l in 0..=MAX_LEVEL {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        assert!(tiler.tile(&index, true).is_none());
    }

    tiler.insert_marker(MarkerId(1), COORD_50_60).unwrap();
    for l in 0..=MAX_LEVEL {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        let tile = tiler.tile(&index, true).expect("tile should exist");
        assert!(tile.children_empty());
        assert_eq!(tiler.marker_count(&index), 1);
    }

    tiler.insert_marker(MarkerId(2), COORD_50_60).unwrap();
    for l in 0..=MAX_LEVEL {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        assert!(tiler.tile(&index, true).is_some());
        assert_eq!(tiler.marker_count(&index), 2);
    }
}

#[test]
fn test_remove_one_of_two_markers() {
    let mut tiler = ItemMarkerTiler::new();
    tiler.insert_marker(MarkerId(1), COORD_50_60).unwrap();
    tiler.insert_marker(MarkerId(2), COORD_50_60).unwrap();

    for l in 0..=MAX_LEVEL {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        assert_eq!(tiler.marker_count(&index), 2);
    }

    tiler.remove_marker(MarkerId(2)).unwrap();
    for l in 0..=MAX_LEVEL {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        assert!(tiler.tile(&index, true).is_some());
        assert_eq!(tiler.marker_count(&index), 1);
    }
}

#[test]
fn test_remove_markers_from_iteration() {
    let mut tiler = ItemMarkerTiler::new();
    for l in 0..=MAX_LEVEL {
        assert_eq!(count_markers(NonEmptyIterator::new(&mut tiler, l)), 0);
    }

    tiler.insert_marker(MarkerId(1), COORD_1_2).unwrap();
    tiler.insert_marker(MarkerId(2), COORD_50_60).unwrap();
    for l in 0..=MAX_LEVEL {
        assert_eq!(count_markers(NonEmptyIterator::new(&mut tiler, l)), 2);
    }

    tiler.remove_marker(MarkerId(1)).unwrap();
    assert_eq!(tiler.len(), 1);
    for l in 0..=MAX_LEVEL {
        assert_eq!(count_markers(NonEmptyIterator::new(&mut tiler, l)), 1);
    }
}

#[test]
fn test_move_single_marker() {
    let mut tiler = ItemMarkerTiler::new();
    let fill_level = MAX_LEVEL - 2;

    tiler.insert_marker(MarkerId(1), COORD_1_2).unwrap();
    for l in 1..=fill_level {
        let index = TileIndex::from_coordinates(&COORD_1_2, l);
        let tile = tiler.tile(&index, true).expect("tile should exist");
        assert!(tile.children_empty());
        assert_eq!(tiler.marker_count(&index), 1);
    }

    tiler.move_marker(MarkerId(1), COORD_50_60).unwrap();
    for l in 0..=fill_level {
        // gone from the old position
        let old = TileIndex::from_coordinates(&COORD_1_2, l);
        assert!(tiler.tile(&old, true).is_none());
        assert_eq!(tiler.marker_count(&old), 0);
        assert!(tiler.tile(&old, true).is_none());

        // found at the new one
        let new = TileIndex::from_coordinates(&COORD_50_60, l);
        let tile = tiler.tile(&new, true).expect("tile should exist");
        assert!(tile.children_empty());
        assert_eq!(tiler.marker_count(&new), 1);
    }
}

#[test]
fn test_move_one_of_two_markers() {
    let mut tiler = ItemMarkerTiler::new();
    let fill_level = MAX_LEVEL - 2;

    tiler.insert_marker(MarkerId(1), COORD_1_2).unwrap();
    tiler.insert_marker(MarkerId(2), COORD_1_2).unwrap();
    for l in 1..=fill_level {
        let index = TileIndex::from_coordinates(&COORD_1_2, l);
        assert!(tiler.tile(&index, true).unwrap().children_empty());
        assert_eq!(tiler.marker_count(&index), 2);
    }

    tiler.insert_marker(MarkerId(3), COORD_50_60).unwrap();
    for l in 1..=fill_level {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        assert!(tiler.tile(&index, true).unwrap().children_empty());
        assert_eq!(tiler.marker_count(&index), 1);
    }

    tiler.move_marker(MarkerId(1), COORD_50_60).unwrap();
    assert_eq!(tiler.item(MarkerId(1)).unwrap().coordinates, Some(COORD_50_60));
    for l in 0..=fill_level {
        let old = TileIndex::from_coordinates(&COORD_1_2, l);
        assert_eq!(tiler.marker_count(&old), 1);

        let new = TileIndex::from_coordinates(&COORD_50_60, l);
        assert!(tiler.tile(&new, true).is_some());
        assert_eq!(tiler.marker_count(&new), 2);
    }
}

#[test]
fn test_iterator_whole_world() {
    let mut tiler = ItemMarkerTiler::new();
    for l in 0..=MAX_LEVEL {
        assert_eq!(count_markers(NonEmptyIterator::new(&mut tiler, l)), 0);
    }

    tiler.insert_marker(MarkerId(1), COORD_1_2).unwrap();
    tiler.insert_marker(MarkerId(2), COORD_50_60).unwrap();
    for l in 0..=MAX_LEVEL {
        assert_eq!(count_markers(NonEmptyIterator::new(&mut tiler, l)), 2);
    }
}

#[test]
fn test_iterator_partial() {
    let mut tiler = ItemMarkerTiler::new();
    tiler.insert_marker(MarkerId(1), COORD_1_2).unwrap();
    tiler.insert_marker(MarkerId(2), COORD_50_60).unwrap();

    for l in 0..=MAX_LEVEL {
        // empty part
        assert_eq!(count_in_bounds(&mut tiler, l, &[pair(-10.0, -10.0, -5.0, -5.0)]), 0);

        // one marker
        assert_eq!(count_in_bounds(&mut tiler, l, &[pair(-10.0, -10.0, 5.0, 5.0)]), 1);
        assert_eq!(count_in_bounds(&mut tiler, l, &[pair(1.0, 2.0, 5.0, 5.0)]), 1);
        assert_eq!(count_in_bounds(&mut tiler, l, &[pair(-1.0, -2.0, 1.0, 2.0)]), 1);

        // two markers
        assert_eq!(count_in_bounds(&mut tiler, l, &[pair(0.0, 0.0, 60.0, 60.0)]), 2);

        // two markers in two parts
        let parts = [pair(0.0, 0.0, 5.0, 5.0), pair(49.0, 59.0, 51.0, 61.0)];
        assert_eq!(count_in_bounds(&mut tiler, l, &parts), 2);
    }

    // at level 1 the bounds end in the cell of (1, 2), so (2, 2) is outside
    tiler.insert_marker(MarkerId(3), Coordinate::new(2.0, 2.0)).unwrap();
    assert_eq!(count_in_bounds(&mut tiler, 1, &[pair(0.0, 0.0, 1.0, 2.0)]), 1);
}

#[test]
fn test_iterator_small_bounds() {
    let mut tiler = ItemMarkerTiler::new();
    let bounds = [pair(0.55, 1.55, 0.56, 1.56)];

    let coords = [
        Coordinate::new(0.556, 1.556),
        Coordinate::new(0.5, 1.5),
        Coordinate::new(0.5, 1.6),
        Coordinate::new(0.6, 1.5),
        Coordinate::new(0.6, 1.6),
    ];
    for (i, c) in coords.into_iter().enumerate() {
        tiler.insert_marker(MarkerId(i as u64), c).unwrap();
    }

    for l in 3..=MAX_LEVEL {
        assert_eq!(count_in_bounds(&mut tiler, l, &bounds), 1, "level {}", l);
    }
}

#[test]
fn test_iterator_across_meridian() {
    let mut tiler = ItemMarkerTiler::new();
    tiler.insert_marker(MarkerId(1), Coordinate::new(0.0, 179.5)).unwrap();
    tiler.insert_marker(MarkerId(2), Coordinate::new(0.0, -179.5)).unwrap();
    tiler.insert_marker(MarkerId(3), Coordinate::new(0.0, 0.0)).unwrap();

    let bounds = GeoBounds::normalized(-5.0, 170.0, 5.0, -170.0);
    assert_eq!(bounds.len(), 2);
    for l in 0..=4 {
        assert_eq!(count_in_bounds(&mut tiler, l, &bounds), 2, "level {}", l);
    }
}

#[test]
fn test_pre_existing_markers() {
    let mut tiler =
        ItemMarkerTiler::from_items([MarkerItem::new(MarkerId(1), COORD_50_60)]).unwrap();
    for l in 0..=MAX_LEVEL {
        assert_eq!(count_markers(NonEmptyIterator::new(&mut tiler, l)), 1);
    }
}

fn assert_tiles(tiler: &mut ItemMarkerTiler, at: Coordinate, count: usize, selected: usize, state: TriState) {
    for l in 0..=MAX_LEVEL {
        let index = TileIndex::from_coordinates(&at, l);
        assert!(tiler.tile(&index, true).is_some(), "missing tile at level {}", l);
        assert_eq!(tiler.marker_count(&index), count, "marker count at level {}", l);
        assert_eq!(tiler.selected_count(&index), selected, "selected count at level {}", l);
        assert_eq!(tiler.group_state(&index).selected(), state, "state at level {}", l);
    }
}

#[test]
fn test_selection_state() {
    let mut tiler = ItemMarkerTiler::new();
    tiler.insert_marker(MarkerId(1), COORD_50_60).unwrap();

    // stop short of the deepest level so that later tiles are created fresh
    for l in 0..=MAX_LEVEL - 2 {
        let index = TileIndex::from_coordinates(&COORD_50_60, l);
        assert!(tiler.tile(&index, true).is_some());
        assert_eq!(tiler.marker_count(&index), 1);
        assert_eq!(tiler.group_state(&index).selected(), TriState::None);
    }

    tiler.set_selected(MarkerId(1), true).unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 1, 1, TriState::All);

    tiler.insert_marker(MarkerId(2), COORD_50_60).unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 2, 1, TriState::Some);

    tiler.set_selected(MarkerId(2), true).unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 2, 2, TriState::All);

    tiler.remove_marker(MarkerId(2)).unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 1, 1, TriState::All);

    // add a selected marker and move it around
    tiler.insert_marker(MarkerId(3), COORD_1_2).unwrap();
    tiler.set_selected(MarkerId(3), true).unwrap();
    assert_tiles(&mut tiler, COORD_1_2, 1, 1, TriState::All);
    assert_tiles(&mut tiler, COORD_50_60, 1, 1, TriState::All);

    tiler.move_marker(MarkerId(3), COORD_50_60).unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 2, 2, TriState::All);

    tiler.move_marker(MarkerId(3), COORD_M50_M60).unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 1, 1, TriState::All);
    assert_tiles(&mut tiler, COORD_M50_M60, 1, 1, TriState::All);
}

#[test]
fn test_pre_existing_selection_is_read() {
    let mut tiler = ItemMarkerTiler::from_items([
        MarkerItem::new(MarkerId(1), COORD_50_60).with_selected(true),
        MarkerItem::new(MarkerId(2), COORD_50_60),
    ])
    .unwrap();
    assert_tiles(&mut tiler, COORD_50_60, 2, 1, TriState::Some);
}
