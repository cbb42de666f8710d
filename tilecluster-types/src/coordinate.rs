use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic position in degrees.
///
/// Latitude is expected in `[-90, 90]` and longitude in `[-180, 180]`.
/// Construction does not validate; use the validation helpers of the main
/// crate before feeding untrusted input into a tile index.
///
/// # Examples
///
/// ```
/// use tilecluster_types::coordinate::Coordinate;
///
/// let c = Coordinate::new(50.0, 60.0);
/// assert_eq!(c.lat(), 50.0);
/// assert_eq!(c.lon(), 60.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Parse a `geo:` URL of the form `geo:lat,lon` or `geo:lat,lon,alt`.
    ///
    /// URI parameters after `;` are ignored. The altitude, if present, must
    /// parse but is discarded. Returns `None` when the string is not a
    /// well-formed geo URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilecluster_types::coordinate::Coordinate;
    ///
    /// let c = Coordinate::from_geo_url("geo:1,2").unwrap();
    /// assert_eq!(c, Coordinate::new(1.0, 2.0));
    ///
    /// assert!(Coordinate::from_geo_url("geo:1").is_none());
    /// assert!(Coordinate::from_geo_url("http:1,2").is_none());
    /// ```
    pub fn from_geo_url(url: &str) -> Option<Self> {
        let body = url.trim().strip_prefix("geo:")?;
        let body = body.split(';').next().unwrap_or_default();

        let parts: Vec<&str> = body.split(',').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return None;
        }

        let lat: f64 = parts[0].trim().parse().ok()?;
        let lon: f64 = parts[1].trim().parse().ok()?;
        if let Some(alt) = parts.get(2) {
            alt.trim().parse::<f64>().ok()?;
        }

        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        Some(Self { lat, lon })
    }

    /// Format the coordinate as a `geo:` URL.
    pub fn geo_url(&self) -> String {
        format!("geo:{},{}", self.lat, self.lon)
    }

    /// Convert to a `geo::Point` (x = longitude, y = latitude).
    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(point: Point<f64>) -> Self {
        Self {
            lat: point.y(),
            lon: point.x(),
        }
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(coordinate: Coordinate) -> Self {
        coordinate.to_point()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}
