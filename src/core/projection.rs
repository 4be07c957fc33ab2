//! Spherical Web Mercator between geographic degrees and world pixels.
//!
//! World pixel space at zoom `z` is a square of side
//! `map_size = 2^z * tile_size`. Longitude maps linearly onto x. Latitude is
//! first passed through the inverse Gudermannian
//! (`atanh(sin(lat))`, expressed in degrees), then mapped linearly onto y
//! with north at the top.
//!
//! Latitudes of ±90° have no image: `atanh(1)` diverges and the unrounded
//! position becomes non-finite. Nothing here clamps; callers keep latitude
//! strictly inside (-90, 90). [`Mercator::to_pixel`] truncates to `u32`
//! with Rust's saturating float cast, so a position outside the map lands
//! on its edge and a NaN lands on 0.

use super::geo::{LatLng, PixelCoord, TileCoord};

/// Web Mercator projection helpers
pub struct Mercator;

impl Mercator {
    /// Side length of the world in pixels at `zoom`.
    pub fn map_size(zoom: u8, tile_size: u32) -> f64 {
        TileCoord::tiles_per_side(zoom) as f64 * tile_size as f64
    }

    /// Latitude after the Mercator conformal transform, in degrees.
    pub fn mercator_latitude(lat: f64) -> f64 {
        lat.to_radians().sin().atanh().to_degrees()
    }

    /// Unrounded world pixel position of `geo`.
    pub fn world_position(geo: &LatLng, zoom: u8, tile_size: u32) -> (f64, f64) {
        let map_size = Self::map_size(zoom, tile_size);
        let x = map_size * (geo.lng + 180.0) / 360.0;
        let y = map_size * (180.0 - Self::mercator_latitude(geo.lat)) / 360.0;
        (x, y)
    }

    /// Projects `geo` into world pixel space, discarding the fractional part.
    pub fn to_pixel(geo: &LatLng, zoom: u8, tile_size: u32) -> PixelCoord {
        let (x, y) = Self::world_position(geo, zoom, tile_size);
        PixelCoord::new(x as u32, y as u32)
    }

    /// Inverse of [`Mercator::world_position`].
    pub fn from_world_position(x: f64, y: f64, zoom: u8, tile_size: u32) -> LatLng {
        let map_size = Self::map_size(zoom, tile_size);
        let lng = x * 360.0 / map_size - 180.0;
        let lat_m = 180.0 - y * 360.0 / map_size;
        let lat = lat_m.to_radians().tanh().asin().to_degrees();
        LatLng::new(lat, lng)
    }

    /// Inverse of [`Mercator::to_pixel`] for the top-left corner of `pixel`.
    pub fn to_geo(pixel: &PixelCoord, zoom: u8, tile_size: u32) -> LatLng {
        Self::from_world_position(pixel.x as f64, pixel.y as f64, zoom, tile_size)
    }
}
