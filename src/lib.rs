//! Hierarchical lat/lon tile index and greedy screen-space clustering of map markers.
//!
//! Markers are sorted into a 10×10-ary grid over the world ([`TileIndex`]),
//! stored sparsely by a marker tiler such as [`ItemMarkerTiler`], enumerated
//! with [`NonEmptyIterator`] and collapsed into on-screen clusters by
//! [`ClusterBuilder`](cluster::ClusterBuilder).
//!
//! ```rust
//! use tilecluster::cluster::{ClusterBuilder, EquirectangularBackend};
//! use tilecluster::{Config, Coordinate, GeoBounds, ItemMarkerTiler, MarkerId, ScreenSize};
//!
//! let mut tiler = ItemMarkerTiler::new();
//! tiler.insert_marker(MarkerId(1), Coordinate::new(48.85, 2.35))?;
//! tiler.insert_marker(MarkerId(2), Coordinate::new(48.86, 2.34))?;
//!
//! let mut builder = ClusterBuilder::with_tiler(Config::default(), tiler);
//! let mut backend = EquirectangularBackend::new(GeoBounds::WORLD, ScreenSize::new(800, 400), 4);
//! builder.update_clusters(&mut backend);
//!
//! assert_eq!(builder.clusters().len(), 1);
//! assert_eq!(builder.clusters()[0].marker_count, 2);
//! # Ok::<(), tilecluster::TileClusterError>(())
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod group_state;
pub mod tile_index;
pub mod tiler;
pub mod validation;

pub use cluster::{Cluster, ClusterBuilder, EquirectangularBackend, MapBackend, PixmapKind};
pub use config::Config;
pub use error::{Result, TileClusterError};
pub use group_state::{GroupDimension, GroupState, GroupStateComputer, TriState};
pub use tile_index::{CornerPosition, MAX_LEVEL, TILING, TileIndex};
pub use tiler::{
    ClickInfo, InteractiveTiler, ItemMarkerTiler, MarkerId, MarkerItem, MarkerTiler, MouseMode,
    NonEmptyIterator, SortKey, Thumbnail, ThumbnailTiler, Tile, TileTree, TilerFlags,
};

pub use geo::{Point, Rect};

pub use tilecluster_types::bounds::GeoBounds;
pub use tilecluster_types::coordinate::Coordinate;
pub use tilecluster_types::screen::{ScreenPoint, ScreenSize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, TileClusterError};

    pub use crate::{Coordinate, GeoBounds, ScreenPoint, ScreenSize, TileIndex};

    pub use crate::{ClusterBuilder, Config, MapBackend};

    pub use crate::{GroupState, GroupStateComputer, TriState};

    pub use crate::{
        InteractiveTiler, ItemMarkerTiler, MarkerId, MarkerTiler, NonEmptyIterator, SortKey,
        ThumbnailTiler,
    };
}
