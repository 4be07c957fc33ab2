use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a geographical coordinate with latitude and longitude in degrees.
///
/// Longitude is expected in [-180, 180] and latitude strictly inside (-90, 90).
/// The poles themselves have no Mercator image; see [`crate::Mercator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within the projectable range
    pub fn is_valid(&self) -> bool {
        self.lat > -90.0 && self.lat < 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A position in world pixel space at some zoom level.
///
/// Both axes lie in `[0, map_size)` where `map_size = 2^zoom * tile_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

impl PixelCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Represents a tile coordinate in the slippy map tile system
///
/// `x` is always in `[0, 2^z)`; tiles whose row falls outside `[0, 2^z)`
/// do not exist and cannot be constructed through [`TileCoord::wrapped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one side of the world at `zoom`.
    pub fn tiles_per_side(zoom: u8) -> u64 {
        1u64.checked_shl(zoom as u32).unwrap_or(u64::MAX)
    }

    /// Builds a tile from an unbounded column/row pair.
    ///
    /// The column wraps horizontally around the world. A row outside the
    /// world yields `None`.
    pub fn wrapped(zoom: u8, x: i64, y: i64) -> Option<Self> {
        let n = Self::tiles_per_side(zoom).min(i64::MAX as u64) as i64;
        if y < 0 || y >= n {
            return None;
        }
        let x = x.rem_euclid(n);
        Some(Self::new(x as u32, y as u32, zoom))
    }

    /// Gets the parent tile at a lower zoom level
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            None
        } else {
            Some(TileCoord::new(self.x / 2, self.y / 2, self.z - 1))
        }
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        let max_coord = Self::tiles_per_side(self.z);
        (self.x as u64) < max_coord && (self.y as u64) < max_coord
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(61.4667, 23.8564);
        assert_eq!(coord.lat, 61.4667);
        assert_eq!(coord.lng, 23.8564);
        assert!(coord.is_valid());
        assert!(!LatLng::new(90.0, 0.0).is_valid());
    }

    #[test]
    fn test_wrap_lng() {
        assert_eq!(LatLng::wrap_lng(190.0), -170.0);
        assert_eq!(LatLng::wrap_lng(-190.0), 170.0);
        assert_eq!(LatLng::wrap_lng(45.0), 45.0);
    }

    #[test]
    fn test_tile_wraps_columns() {
        assert_eq!(TileCoord::wrapped(2, -1, 0), Some(TileCoord::new(3, 0, 2)));
        assert_eq!(TileCoord::wrapped(2, 4, 1), Some(TileCoord::new(0, 1, 2)));
        assert_eq!(TileCoord::wrapped(2, 9, 3), Some(TileCoord::new(1, 3, 2)));
        assert_eq!(TileCoord::wrapped(0, -7, 0), Some(TileCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_tile_rejects_rows_outside_world() {
        assert_eq!(TileCoord::wrapped(2, 0, -1), None);
        assert_eq!(TileCoord::wrapped(2, 0, 4), None);
    }

    #[test]
    fn test_parent_chain() {
        let tile = TileCoord::new(5, 3, 3);
        assert_eq!(tile.parent(), Some(TileCoord::new(2, 1, 2)));
        assert_eq!(TileCoord::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_display_key() {
        assert_eq!(TileCoord::new(7, 9, 4).to_string(), "4.7.9");
    }
}
