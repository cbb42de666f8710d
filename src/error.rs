//! Error types for tile indexing and clustering.

use crate::tiler::MarkerId;
use thiserror::Error;

/// Recoverable failures surfaced by the public API.
///
/// Programming errors (out-of-range tile levels, mismatched iterator bounds)
/// are not represented here: they panic via assertions.
#[derive(Debug, Error)]
pub enum TileClusterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("tile level {0} exceeds the maximum level")]
    InvalidLevel(u8),

    #[error("unknown marker: {0}")]
    UnknownMarker(MarkerId),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TileClusterError>;
