//! The rendering backend seam used by the cluster builder.

use tilecluster_types::bounds::GeoBounds;
use tilecluster_types::coordinate::Coordinate;
use tilecluster_types::screen::{ScreenPoint, ScreenSize};

/// Projection and viewport queries of a map widget.
///
/// The cluster builder calls each query once per recompute. A failed
/// projection only excludes the affected tile from the current frame.
pub trait MapBackend {
    /// Whether the widget can answer projection queries yet.
    fn is_ready(&self) -> bool;

    fn screen_size(&self) -> ScreenSize;

    /// Pixel position of `coordinate`, or `None` if it cannot be projected.
    ///
    /// Positions outside the screen may be returned; the caller discards them.
    fn project_to_screen(&self, coordinate: &Coordinate) -> Option<ScreenPoint>;

    /// Normalized visible rectangles and the tile level matching the zoom.
    fn visible_bounds_and_level(&self) -> (Vec<GeoBounds>, u8);

    /// Ask the widget to repaint with the current cluster list.
    fn request_redraw(&mut self);
}

/// A plate carrée viewport: latitude and longitude map linearly to pixels.
///
/// The view may cross the ±180° meridian (east edge smaller than west edge).
///
/// # Examples
///
/// ```
/// use tilecluster::cluster::{EquirectangularBackend, MapBackend};
/// use tilecluster::{Coordinate, GeoBounds, ScreenPoint, ScreenSize};
///
/// let backend = EquirectangularBackend::new(
///     GeoBounds::from_edges(0.0, 0.0, 10.0, 10.0),
///     ScreenSize::new(100, 100),
///     1,
/// );
/// assert_eq!(
///     backend.project_to_screen(&Coordinate::new(5.0, 2.5)),
///     Some(ScreenPoint::new(25, 50))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EquirectangularBackend {
    view: GeoBounds,
    screen: ScreenSize,
    level: u8,
    ready: bool,
    redraw_requests: u64,
}

impl EquirectangularBackend {
    pub fn new(view: GeoBounds, screen: ScreenSize, level: u8) -> Self {
        Self {
            view,
            screen,
            level,
            ready: true,
            redraw_requests: 0,
        }
    }

    pub fn view(&self) -> &GeoBounds {
        &self.view
    }

    pub fn set_view(&mut self, view: GeoBounds, level: u8) {
        self.view = view;
        self.level = level;
    }

    pub fn set_screen_size(&mut self, screen: ScreenSize) {
        self.screen = screen;
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Number of redraws requested so far.
    pub fn redraw_requests(&self) -> u64 {
        self.redraw_requests
    }

    fn crosses_meridian(&self) -> bool {
        self.view.east() < self.view.west()
    }

    fn lon_span(&self) -> f64 {
        let span = self.view.east() - self.view.west();
        if self.crosses_meridian() { span + 360.0 } else { span }
    }
}

impl MapBackend for EquirectangularBackend {
    fn is_ready(&self) -> bool {
        self.ready && !self.screen.is_empty()
    }

    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn project_to_screen(&self, coordinate: &Coordinate) -> Option<ScreenPoint> {
        if !coordinate.lat.is_finite() || !coordinate.lon.is_finite() {
            return None;
        }

        let lat_span = self.view.north() - self.view.south();
        let lon_span = self.lon_span();
        if lat_span <= 0.0 || lon_span <= 0.0 {
            return None;
        }

        let mut dx = coordinate.lon - self.view.west();
        if self.crosses_meridian() {
            dx = dx.rem_euclid(360.0);
        }
        let dy = self.view.north() - coordinate.lat;

        let x = (dx / lon_span * f64::from(self.screen.width)).floor();
        let y = (dy / lat_span * f64::from(self.screen.height)).floor();
        if x.abs() > f64::from(i32::MAX) || y.abs() > f64::from(i32::MAX) {
            return None;
        }
        Some(ScreenPoint::new(x as i32, y as i32))
    }

    fn visible_bounds_and_level(&self) -> (Vec<GeoBounds>, u8) {
        let bounds = GeoBounds::normalized(
            self.view.south(),
            self.view.west(),
            self.view.north(),
            self.view.east(),
        );
        (bounds, self.level)
    }

    fn request_redraw(&mut self) {
        self.redraw_requests += 1;
    }
}
