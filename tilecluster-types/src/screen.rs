use serde::{Deserialize, Serialize};

/// An integer pixel position on the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance in pixels.
    ///
    /// ```
    /// use tilecluster_types::screen::ScreenPoint;
    ///
    /// let a = ScreenPoint::new(10, 10);
    /// let b = ScreenPoint::new(12, 11);
    /// assert_eq!(a.squared_distance(&b), 5);
    /// ```
    pub fn squared_distance(&self, other: &ScreenPoint) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// Pixel dimensions of the map widget or of a rendered cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if `point` lies on the pixel grid `[0, width) x [0, height)`.
    pub fn contains(&self, point: &ScreenPoint) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as i64) < i64::from(self.width)
            && (point.y as i64) < i64::from(self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
