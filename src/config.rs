//! Clustering and display settings.
//!
//! The grouping radii and thumbnail size are plain numbers handed to the
//! cluster builder. The setters keep them consistent: a thumbnail never
//! exceeds twice the thumbnail grouping radius.

use crate::tiler::SortKey;
use serde::de::Error;

/// Smallest allowed marker grouping radius in pixels.
pub const MIN_MARKER_GROUPING_RADIUS: u32 = 1;
/// Smallest allowed thumbnail grouping radius in pixels.
pub const MIN_THUMBNAIL_GROUPING_RADIUS: u32 = 15;
/// Smallest allowed thumbnail edge length in pixels.
pub const MIN_THUMBNAIL_SIZE: u32 = 30;
/// Largest allowed grouping radius in pixels, for markers and thumbnails alike.
pub const MAX_GROUPING_RADIUS: u32 = 4096;
/// Largest allowed thumbnail edge length in pixels.
pub const MAX_THUMBNAIL_SIZE: u32 = 2 * MAX_GROUPING_RADIUS;

/// Clustering configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Grouping radius used while plain markers are displayed
    #[serde(default = "Config::default_marker_grouping_radius")]
    pub marker_grouping_radius: u32,

    /// Grouping radius used while thumbnails are displayed
    #[serde(default = "Config::default_thumbnail_grouping_radius")]
    pub thumbnail_grouping_radius: u32,

    #[serde(default = "Config::default_thumbnail_size")]
    pub thumbnail_size: u32,

    #[serde(default)]
    pub show_thumbnails: bool,

    /// Criterion for picking the thumbnail shown for a cluster
    #[serde(default)]
    pub sort_key: SortKey,
}

impl Config {
    const fn default_marker_grouping_radius() -> u32 {
        15
    }

    const fn default_thumbnail_grouping_radius() -> u32 {
        30
    }

    const fn default_thumbnail_size() -> u32 {
        60
    }

    /// Set the marker grouping radius, clamped to the allowed range.
    pub fn with_marker_grouping_radius(mut self, radius: u32) -> Self {
        self.marker_grouping_radius =
            radius.clamp(MIN_MARKER_GROUPING_RADIUS, MAX_GROUPING_RADIUS);
        self
    }

    /// Set the thumbnail grouping radius, clamped to the allowed range.
    ///
    /// Shrinks the thumbnail when it would no longer fit into the radius.
    pub fn with_thumbnail_grouping_radius(mut self, radius: u32) -> Self {
        self.thumbnail_grouping_radius =
            radius.clamp(MIN_THUMBNAIL_GROUPING_RADIUS, MAX_GROUPING_RADIUS);

        if self.thumbnail_size > 2 * self.thumbnail_grouping_radius {
            self.thumbnail_size = 2 * self.thumbnail_grouping_radius;
        }
        self
    }

    /// Set the thumbnail edge length, clamped to the allowed range.
    ///
    /// Grows the thumbnail grouping radius when the thumbnail no longer fits.
    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size.clamp(MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE);

        if 2 * self.thumbnail_grouping_radius < self.thumbnail_size {
            self.thumbnail_grouping_radius = self.thumbnail_size / 2 + self.thumbnail_size % 2;
        }
        self
    }

    pub fn with_show_thumbnails(mut self, show: bool) -> Self {
        self.show_thumbnails = show;
        self
    }

    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// The radius that applies to the current display mode.
    pub fn grouping_radius(&self) -> u32 {
        if self.show_thumbnails {
            self.thumbnail_grouping_radius
        } else {
            self.marker_grouping_radius
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.marker_grouping_radius < MIN_MARKER_GROUPING_RADIUS {
            return Err(format!(
                "Marker grouping radius must be at least {}",
                MIN_MARKER_GROUPING_RADIUS
            ));
        }

        if self.thumbnail_grouping_radius < MIN_THUMBNAIL_GROUPING_RADIUS {
            return Err(format!(
                "Thumbnail grouping radius must be at least {}",
                MIN_THUMBNAIL_GROUPING_RADIUS
            ));
        }

        if self.thumbnail_size < MIN_THUMBNAIL_SIZE {
            return Err(format!(
                "Thumbnail size must be at least {}",
                MIN_THUMBNAIL_SIZE
            ));
        }

        for (name, radius) in [
            ("Marker", self.marker_grouping_radius),
            ("Thumbnail", self.thumbnail_grouping_radius),
        ] {
            if radius > MAX_GROUPING_RADIUS {
                return Err(format!(
                    "{} grouping radius {} exceeds the maximum of {}",
                    name, radius, MAX_GROUPING_RADIUS
                ));
            }
        }

        if self.thumbnail_size > 2 * self.thumbnail_grouping_radius {
            return Err(format!(
                "Thumbnail size {} exceeds twice the thumbnail grouping radius {}",
                self.thumbnail_size, self.thumbnail_grouping_radius
            ));
        }

        if self.grouping_radius() > 1000 {
            log::warn!(
                "Grouping radius of {} pixels will merge most of the screen into one cluster",
                self.grouping_radius()
            );
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marker_grouping_radius: Self::default_marker_grouping_radius(),
            thumbnail_grouping_radius: Self::default_thumbnail_grouping_radius(),
            thumbnail_size: Self::default_thumbnail_size(),
            show_thumbnails: false,
            sort_key: SortKey::default(),
        }
    }
}
