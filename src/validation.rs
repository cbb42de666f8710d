//! Validation for coordinates, bounds and tile levels at the API boundary.

use crate::error::{Result, TileClusterError};
use crate::tile_index::MAX_LEVEL;
use tilecluster_types::bounds::GeoBounds;
use tilecluster_types::coordinate::Coordinate;

/// Validates that a coordinate is finite and inside the world.
///
/// Latitude: [-90.0, 90.0], Longitude: [-180.0, 180.0]
///
/// # Examples
///
/// ```
/// use tilecluster::validation::validate_coordinate;
/// use tilecluster::Coordinate;
///
/// assert!(validate_coordinate(&Coordinate::new(52.52, 13.40)).is_ok());
///
/// // Invalid latitude
/// assert!(validate_coordinate(&Coordinate::new(95.0, 13.40)).is_err());
/// ```
pub fn validate_coordinate(coordinate: &Coordinate) -> Result<()> {
    let (lat, lon) = (coordinate.lat, coordinate.lon);

    if !lat.is_finite() {
        return Err(TileClusterError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            lat
        )));
    }

    if !lon.is_finite() {
        return Err(TileClusterError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            lon
        )));
    }

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(TileClusterError::InvalidCoordinates { lat, lon });
    }

    Ok(())
}

/// Validates a bounding rectangle.
///
/// Both corners must be valid coordinates and the south edge must not lie
/// north of the north edge. East may be smaller than west: such a rectangle
/// crosses the ±180° meridian and is split by [`GeoBounds::normalized`].
pub fn validate_bounds(bounds: &GeoBounds) -> Result<()> {
    validate_coordinate(&bounds.south_west)
        .map_err(|e| TileClusterError::InvalidInput(format!("South-west corner: {}", e)))?;
    validate_coordinate(&bounds.north_east)
        .map_err(|e| TileClusterError::InvalidInput(format!("North-east corner: {}", e)))?;

    if bounds.south() > bounds.north() {
        return Err(TileClusterError::InvalidInput(format!(
            "South edge {} lies north of north edge {}",
            bounds.south(),
            bounds.north()
        )));
    }

    Ok(())
}

/// Validates a tile level requested through a public entry point.
pub fn validate_level(level: u8) -> Result<u8> {
    if level > MAX_LEVEL {
        return Err(TileClusterError::InvalidLevel(level));
    }
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        let berlin = Coordinate::new(52.52, 13.405);
        assert!(validate_coordinate(&berlin).is_ok());

        let sydney = Coordinate::new(-33.8688, 151.2093);
        assert!(validate_coordinate(&sydney).is_ok());

        // Edge cases
        assert!(validate_coordinate(&Coordinate::new(90.0, 180.0)).is_ok());
        assert!(validate_coordinate(&Coordinate::new(-90.0, -180.0)).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            validate_coordinate(&Coordinate::new(90.1, 0.0)),
            Err(TileClusterError::InvalidCoordinates { .. })
        ));
        assert!(validate_coordinate(&Coordinate::new(0.0, -180.5)).is_err());
        assert!(validate_coordinate(&Coordinate::new(-95.0, 10.0)).is_err());
    }

    #[test]
    fn test_non_finite() {
        assert!(validate_coordinate(&Coordinate::new(f64::NAN, 0.0)).is_err());
        assert!(validate_coordinate(&Coordinate::new(0.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_bounds() {
        assert!(validate_bounds(&GeoBounds::from_edges(-10.0, 170.0, 10.0, -170.0)).is_ok());
        assert!(validate_bounds(&GeoBounds::from_edges(10.0, 0.0, -10.0, 5.0)).is_err());
        assert!(validate_bounds(&GeoBounds::from_edges(-10.0, 0.0, 100.0, 5.0)).is_err());
    }

    #[test]
    fn test_level() {
        assert_eq!(validate_level(0).unwrap(), 0);
        assert_eq!(validate_level(MAX_LEVEL).unwrap(), MAX_LEVEL);
        assert!(matches!(
            validate_level(MAX_LEVEL + 1),
            Err(TileClusterError::InvalidLevel(10))
        ));
    }
}
