use crate::coordinate::Coordinate;
use geo::{Rect, coord};
use serde::{Deserialize, Serialize};

/// An axis-aligned geographic rectangle given by its south-west and
/// north-east corners.
///
/// A normalized rectangle never crosses the ±180° meridian: its south-west
/// corner is strictly smaller than its north-east corner on both axes. Views
/// that straddle the meridian are represented by two adjoining rectangles,
/// see [`GeoBounds::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl GeoBounds {
    pub const WORLD: GeoBounds = GeoBounds {
        south_west: Coordinate::new(-90.0, -180.0),
        north_east: Coordinate::new(90.0, 180.0),
    };

    /// Create bounds from the south-west and north-east corners.
    pub const fn new(south_west: Coordinate, north_east: Coordinate) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Create bounds from the four edges.
    pub const fn from_edges(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south_west: Coordinate::new(south, west),
            north_east: Coordinate::new(north, east),
        }
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn west(&self) -> f64 {
        self.south_west.lon
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn east(&self) -> f64 {
        self.north_east.lon
    }

    /// True if the first corner is strictly smaller than the second on both axes.
    pub fn is_normalized(&self) -> bool {
        self.south() < self.north() && self.west() < self.east()
    }

    /// Inclusive containment test.
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.south()..=self.north()).contains(&coordinate.lat)
            && (self.west()..=self.east()).contains(&coordinate.lon)
    }

    /// Split a possibly meridian-crossing view into normalized rectangles.
    ///
    /// When `east < west` the view wraps around the ±180° meridian and two
    /// rectangles are returned: the eastern part `[-180, east]` first, then the
    /// western part `[west, 180]`. Otherwise a single rectangle is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilecluster_types::bounds::GeoBounds;
    ///
    /// let parts = GeoBounds::normalized(-10.0, 170.0, 10.0, -170.0);
    /// assert_eq!(parts.len(), 2);
    /// assert_eq!(parts[0], GeoBounds::from_edges(-10.0, -180.0, 10.0, -170.0));
    /// assert_eq!(parts[1], GeoBounds::from_edges(-10.0, 170.0, 10.0, 180.0));
    /// ```
    pub fn normalized(south: f64, west: f64, north: f64, east: f64) -> Vec<GeoBounds> {
        if east < west {
            vec![
                GeoBounds::from_edges(south, -180.0, north, east),
                GeoBounds::from_edges(south, west, north, 180.0),
            ]
        } else {
            vec![GeoBounds::from_edges(south, west, north, east)]
        }
    }

    /// Convert to a `geo::Rect` in (lon, lat) space.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west(), y: self.south() },
            coord! { x: self.east(), y: self.north() },
        )
    }
}

impl From<Rect<f64>> for GeoBounds {
    fn from(rect: Rect<f64>) -> Self {
        GeoBounds::from_edges(rect.min().y, rect.min().x, rect.max().y, rect.max().x)
    }
}
