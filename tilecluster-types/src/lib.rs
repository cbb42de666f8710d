//! # tilecluster-types
//!
//! Value types shared by the tilecluster marker grouping engine:
//!
//! - **Geographic types**: `Coordinate`, `GeoBounds`
//! - **Screen types**: `ScreenPoint`, `ScreenSize`
//!
//! All types are serializable with Serde and convert to and from the `geo`
//! crate's primitives.
//!
//! ## Examples
//!
//! ```rust
//! use tilecluster_types::bounds::GeoBounds;
//! use tilecluster_types::coordinate::Coordinate;
//!
//! let berlin = Coordinate::new(52.52, 13.405);
//! let europe = GeoBounds::from_edges(35.0, -10.0, 70.0, 40.0);
//! assert!(europe.contains(&berlin));
//! ```

pub mod bounds;
pub mod coordinate;
pub mod screen;
