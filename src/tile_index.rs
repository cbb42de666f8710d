//! Hierarchical 10×10 lat/lon grid addressing.
//!
//! A [`TileIndex`] is a path through a fixed-branching grid over the whole
//! world. Each path element is a linear cell index in `[0, 99]` that selects
//! one cell of a 10×10 subdivision of its parent's extent:
//!
//! ```text
//! linear = lat_index * 10 + lon_index
//! ```
//!
//! The empty path addresses the root (the whole world). A path of length
//! `n` has level `n - 1`, so a level-0 index already names one of the 100
//! top-level cells.

use crate::error::{Result, TileClusterError};
use crate::validation::validate_level;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use tilecluster_types::coordinate::Coordinate;

/// Branching factor per axis.
pub const TILING: u8 = 10;

/// Number of children of a tile.
pub const CHILD_COUNT: usize = (TILING as usize) * (TILING as usize);

/// Deepest addressable level.
pub const MAX_LEVEL: u8 = 9;

/// Maximum number of path elements.
pub const MAX_INDEX_COUNT: usize = MAX_LEVEL as usize + 1;

const WORLD_SOUTH: f64 = -90.0;
const WORLD_WEST: f64 = -180.0;
const WORLD_LAT_SPAN: f64 = 180.0;
const WORLD_LON_SPAN: f64 = 360.0;

/// Corner of a tile's rectangular extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CornerPosition {
    NorthWest,
    #[default]
    SouthWest,
    NorthEast,
    SouthEast,
}

/// Path through the hierarchical grid.
///
/// Cheap to clone; holds at most [`MAX_INDEX_COUNT`] elements inline.
///
/// # Examples
///
/// ```
/// use tilecluster::{Coordinate, TileIndex};
///
/// let index = TileIndex::from_coordinates(&Coordinate::new(50.0, 60.0), 2);
/// assert_eq!(index.level(), 2);
/// assert_eq!(index.index_count(), 3);
///
/// let parent = index.mid(0, 2);
/// assert_eq!(parent, TileIndex::from_coordinates(&Coordinate::new(50.0, 60.0), 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TileIndex {
    indices: SmallVec<[u8; MAX_INDEX_COUNT]>,
}

/// Validate a requested level, panicking in debug builds and clamping in release.
pub(crate) fn checked_level(level: u8) -> u8 {
    debug_assert!(
        level <= MAX_LEVEL,
        "tile level {} exceeds maximum level {}",
        level,
        MAX_LEVEL
    );
    validate_level(level).unwrap_or_else(|e| {
        log::warn!("{}, clamping to {}", e, MAX_LEVEL);
        MAX_LEVEL
    })
}

impl TileIndex {
    /// The empty path, addressing the root tile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the tile containing `coordinate` at `level`.
    ///
    /// The resulting index has `level + 1` elements. Coordinates on the
    /// outer edge of the world (latitude 90 or longitude 180), or cells
    /// produced by floating point rounding, are clamped to the last valid
    /// cell instead of overflowing.
    pub fn from_coordinates(coordinate: &Coordinate, level: u8) -> Self {
        let level = checked_level(level);

        let mut tile_south = WORLD_SOUTH;
        let mut tile_west = WORLD_WEST;
        let mut tile_lat_span = WORLD_LAT_SPAN;
        let mut tile_lon_span = WORLD_LON_SPAN;

        let mut result = TileIndex::new();
        let divisor = f64::from(TILING);
        let last_cell = i64::from(TILING) - 1;

        for l in 0..=level {
            let d_lat = tile_lat_span / divisor;
            let d_lon = tile_lon_span / divisor;

            let raw_lat = ((coordinate.lat - tile_south) / d_lat).floor() as i64;
            let raw_lon = ((coordinate.lon - tile_west) / d_lon).floor() as i64;

            let lat_index = raw_lat.clamp(0, last_cell);
            let lon_index = raw_lon.clamp(0, last_cell);

            if raw_lat < 0 || raw_lon < 0 {
                log::debug!(
                    "Rounding error at level {} for {}: cell ({}, {}) clamped",
                    l,
                    coordinate,
                    raw_lat,
                    raw_lon
                );
            }

            result.append_lat_lon_index(lat_index as u8, lon_index as u8);

            tile_south += lat_index as f64 * d_lat;
            tile_west += lon_index as f64 * d_lon;
            tile_lat_span = d_lat;
            tile_lon_span = d_lon;
        }

        result
    }

    /// Build an index from raw linear cell indices.
    ///
    /// # Errors
    ///
    /// Returns an error if there are more than [`MAX_INDEX_COUNT`] elements
    /// or an element is not a valid cell index.
    pub fn from_linear_indices(indices: &[u8]) -> Result<Self> {
        if indices.len() > MAX_INDEX_COUNT {
            return Err(TileClusterError::InvalidInput(format!(
                "tile path has {} elements, at most {} are allowed",
                indices.len(),
                MAX_INDEX_COUNT
            )));
        }

        if let Some(bad) = indices.iter().find(|&&i| usize::from(i) >= CHILD_COUNT) {
            return Err(TileClusterError::InvalidInput(format!(
                "linear tile index {} out of range [0, {})",
                bad, CHILD_COUNT
            )));
        }

        Ok(Self {
            indices: SmallVec::from_slice(indices),
        })
    }

    /// Build an index from `(lat_index, lon_index)` pairs, one per level.
    pub fn from_lat_lon_indices(pairs: &[(u8, u8)]) -> Result<Self> {
        if let Some(&(lat, lon)) = pairs.iter().find(|(lat, lon)| *lat >= TILING || *lon >= TILING) {
            return Err(TileClusterError::InvalidInput(format!(
                "cell ({}, {}) out of range [0, {})",
                lat, lon, TILING
            )));
        }
        let linear: SmallVec<[u8; MAX_INDEX_COUNT]> =
            pairs.iter().map(|(lat, lon)| lat * TILING + lon).collect();
        Self::from_linear_indices(&linear)
    }

    /// Number of path elements.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Depth of the addressed tile, `max(index_count - 1, 0)`.
    pub fn level(&self) -> u8 {
        self.indices.len().saturating_sub(1) as u8
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Linear cell index at `level`.
    ///
    /// # Panics
    ///
    /// Panics if the path has no element at `level`.
    pub fn linear_index(&self, level: u8) -> u8 {
        assert!(
            usize::from(level) < self.indices.len(),
            "level {} out of range for tile index of {} elements",
            level,
            self.indices.len()
        );
        self.indices[usize::from(level)]
    }

    pub fn lat_index(&self, level: u8) -> u8 {
        self.linear_index(level) / TILING
    }

    pub fn lon_index(&self, level: u8) -> u8 {
        self.linear_index(level) % TILING
    }

    /// Last path element, i.e. the index of this tile within its parent.
    pub fn last_index(&self) -> Option<u8> {
        self.indices.last().copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.indices
    }

    pub fn to_linear_indices(&self) -> Vec<u8> {
        self.indices.to_vec()
    }

    pub fn append_linear_index(&mut self, index: u8) {
        assert!(
            self.indices.len() < MAX_INDEX_COUNT,
            "tile index already has the maximum of {} elements",
            MAX_INDEX_COUNT
        );
        debug_assert!(usize::from(index) < CHILD_COUNT, "linear index {} out of range", index);
        self.indices.push(index);
    }

    pub fn append_lat_lon_index(&mut self, lat_index: u8, lon_index: u8) {
        debug_assert!(lat_index < TILING && lon_index < TILING);
        self.append_linear_index(lat_index * TILING + lon_index);
    }

    /// Contiguous sub-path of at most `length` elements starting at `first`.
    ///
    /// `index.mid(0, n)` yields the ancestor with `n` elements.
    pub fn mid(&self, first: usize, length: usize) -> TileIndex {
        let start = first.min(self.indices.len());
        let end = start.saturating_add(length).min(self.indices.len());
        TileIndex {
            indices: SmallVec::from_slice(&self.indices[start..end]),
        }
    }

    /// Move to the parent tile by dropping the last element.
    ///
    /// # Panics
    ///
    /// Panics if the path is already empty.
    pub fn one_up(&mut self) {
        assert!(!self.indices.is_empty(), "cannot move above the root tile");
        self.indices.pop();
    }

    /// Compare the path prefixes of `a` and `b` up to and including `up_to_level`.
    pub fn indices_equal(a: &TileIndex, b: &TileIndex, up_to_level: u8) -> bool {
        let count = usize::from(up_to_level) + 1;
        assert!(
            a.indices.len() >= count && b.indices.len() >= count,
            "both tile indices need at least {} elements",
            count
        );
        a.indices[..count] == b.indices[..count]
    }

    /// South-west corner of the addressed tile.
    pub fn to_coordinates(&self) -> Coordinate {
        self.to_coordinates_of(CornerPosition::SouthWest)
    }

    /// A specific corner of the addressed tile.
    pub fn to_coordinates_of(&self, corner: CornerPosition) -> Coordinate {
        let mut tile_south = WORLD_SOUTH;
        let mut tile_west = WORLD_WEST;
        let mut tile_lat_span = WORLD_LAT_SPAN;
        let mut tile_lon_span = WORLD_LON_SPAN;
        let divisor = f64::from(TILING);

        for l in 0..self.indices.len() {
            let d_lat = tile_lat_span / divisor;
            let d_lon = tile_lon_span / divisor;
            let level = l as u8;

            tile_south += f64::from(self.lat_index(level)) * d_lat;
            tile_west += f64::from(self.lon_index(level)) * d_lon;
            tile_lat_span = d_lat;
            tile_lon_span = d_lon;
        }

        match corner {
            CornerPosition::SouthWest => Coordinate::new(tile_south, tile_west),
            CornerPosition::NorthWest => Coordinate::new(tile_south + tile_lat_span, tile_west),
            CornerPosition::NorthEast => {
                Coordinate::new(tile_south + tile_lat_span, tile_west + tile_lon_span)
            }
            CornerPosition::SouthEast => Coordinate::new(tile_south, tile_west + tile_lon_span),
        }
    }

    /// Cell size in degrees (latitude span, longitude span) at `level`.
    pub fn cell_size(level: u8) -> (f64, f64) {
        let divisions = f64::from(TILING).powi(i32::from(level) + 1);
        (WORLD_LAT_SPAN / divisions, WORLD_LON_SPAN / divisions)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.indices.is_empty() {
            return write!(f, "<root>");
        }
        for (i, index) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_matches_requested_level() {
        let c = Coordinate::new(1.0, 2.0);
        for l in 0..=MAX_LEVEL {
            let index = TileIndex::from_coordinates(&c, l);
            assert_eq!(index.level(), l);
            assert_eq!(index.index_count(), usize::from(l) + 1);
        }
    }

    #[test]
    fn test_top_level_cell() {
        // lat 50 -> (50 + 90) / 18 = 7.7 -> 7, lon 60 -> (60 + 180) / 36 = 6.6 -> 6
        let index = TileIndex::from_coordinates(&Coordinate::new(50.0, 60.0), 0);
        assert_eq!(index.lat_index(0), 7);
        assert_eq!(index.lon_index(0), 6);
        assert_eq!(index.linear_index(0), 76);
    }

    #[test]
    fn test_world_edges_clamp() {
        let north_east = TileIndex::from_coordinates(&Coordinate::new(90.0, 180.0), 3);
        for l in 0..=3 {
            assert_eq!(north_east.linear_index(l), 99);
        }

        let south_west = TileIndex::from_coordinates(&Coordinate::new(-90.0, -180.0), 3);
        for l in 0..=3 {
            assert_eq!(south_west.linear_index(l), 0);
        }
    }

    #[test]
    fn test_corners() {
        let index = TileIndex::from_linear_indices(&[76]).unwrap();
        assert_eq!(index.to_coordinates(), Coordinate::new(36.0, 36.0));
        assert_eq!(
            index.to_coordinates_of(CornerPosition::NorthWest),
            Coordinate::new(54.0, 36.0)
        );
        assert_eq!(
            index.to_coordinates_of(CornerPosition::NorthEast),
            Coordinate::new(54.0, 72.0)
        );
        assert_eq!(
            index.to_coordinates_of(CornerPosition::SouthEast),
            Coordinate::new(36.0, 72.0)
        );
    }

    #[test]
    fn test_root_coordinates() {
        let root = TileIndex::new();
        assert_eq!(root.level(), 0);
        assert_eq!(root.to_coordinates(), Coordinate::new(-90.0, -180.0));
        assert_eq!(
            root.to_coordinates_of(CornerPosition::NorthEast),
            Coordinate::new(90.0, 180.0)
        );
    }

    #[test]
    fn test_mid_and_one_up() {
        let mut index = TileIndex::from_linear_indices(&[1, 22, 33, 44]).unwrap();
        assert_eq!(index.mid(1, 2).as_slice(), &[22, 33]);
        assert_eq!(index.mid(2, 10).as_slice(), &[33, 44]);
        assert!(index.mid(5, 1).is_empty());

        index.one_up();
        assert_eq!(index.as_slice(), &[1, 22, 33]);
        assert_eq!(index.last_index(), Some(33));
    }

    #[test]
    #[should_panic(expected = "cannot move above the root tile")]
    fn test_one_up_on_root_panics() {
        TileIndex::new().one_up();
    }

    #[test]
    #[should_panic(expected = "maximum")]
    fn test_append_beyond_max_panics() {
        let mut index = TileIndex::from_linear_indices(&[0; MAX_INDEX_COUNT]).unwrap();
        index.append_linear_index(1);
    }

    #[test]
    fn test_indices_equal() {
        let a = TileIndex::from_linear_indices(&[5, 6, 7]).unwrap();
        let b = TileIndex::from_linear_indices(&[5, 6, 8]).unwrap();
        assert!(TileIndex::indices_equal(&a, &b, 0));
        assert!(TileIndex::indices_equal(&a, &b, 1));
        assert!(!TileIndex::indices_equal(&a, &b, 2));
    }

    #[test]
    fn test_from_linear_indices_rejects_invalid() {
        assert!(TileIndex::from_linear_indices(&[100]).is_err());
        assert!(TileIndex::from_linear_indices(&[0; MAX_INDEX_COUNT + 1]).is_err());
        assert!(TileIndex::from_linear_indices(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_display() {
        let index = TileIndex::from_linear_indices(&[3, 45, 99]).unwrap();
        assert_eq!(index.to_string(), "3-45-99");
        assert_eq!(TileIndex::new().to_string(), "<root>");
    }

    #[test]
    fn test_cell_size() {
        let (lat, lon) = TileIndex::cell_size(0);
        assert_eq!(lat, 18.0);
        assert_eq!(lon, 36.0);
    }
}
