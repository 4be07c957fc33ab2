use crate::core::constants::{MAX_ZOOM, MIN_ZOOM, TILE_SIZE};
use crate::core::geo::{LatLng, TileCoord};
use crate::core::projection::Mercator;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Manages the current view of the map: center, zoom, and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    zoom: u8,
    /// Width of the viewport in pixels
    width: u32,
    /// Height of the viewport in pixels
    height: u32,
    /// Side length of a tile in pixels
    tile_size: u32,
    /// The minimum allowed zoom level
    min_zoom: u8,
    /// The maximum allowed zoom level
    max_zoom: u8,
}

impl Viewport {
    /// Creates a viewport with the default zoom bounds and tile size.
    ///
    /// `zoom` is clamped into the bounds here; later changes go through
    /// [`Viewport::set_zoom`] and are rejected instead.
    pub fn new(center: LatLng, zoom: u8, width: u32, height: u32) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
            tile_size: TILE_SIZE,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_zoom_bounds(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
        self
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn zoom_bounds(&self) -> (u8, u8) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Sets the zoom level, rejecting values outside the configured bounds.
    pub fn set_zoom(&mut self, zoom: i32) -> Result<()> {
        if zoom < self.min_zoom as i32 || zoom > self.max_zoom as i32 {
            return Err(MapError::InvalidZoom {
                zoom,
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        self.zoom = zoom as u8;
        Ok(())
    }

    pub fn zoom_in(&mut self) -> Result<()> {
        self.set_zoom(self.zoom as i32 + 1)
    }

    pub fn zoom_out(&mut self) -> Result<()> {
        self.set_zoom(self.zoom as i32 - 1)
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.center = center;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Pans the viewport by a drag delta in screen pixels.
    ///
    /// Dragging right moves the center west. The center wraps horizontally
    /// around the world and stops at the top and bottom edges of the map.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let map_size = Mercator::map_size(self.zoom, self.tile_size);
        let (x, y) = Mercator::world_position(&self.center, self.zoom, self.tile_size);

        let x = (x - dx as f64).rem_euclid(map_size);
        let y = (y - dy as f64).clamp(0.0, map_size - 1.0);

        let mut center = Mercator::from_world_position(x, y, self.zoom, self.tile_size);
        center.lng = LatLng::wrap_lng(center.lng);
        self.center = center;
    }

    /// Resolves the tiles needed to cover this viewport.
    pub fn tile_range(&self) -> TileRange {
        TileRange::resolve(
            &self.center,
            self.zoom,
            self.tile_size,
            self.width,
            self.height,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(
            LatLng::default(),
            crate::core::constants::DEFAULT_ZOOM,
            crate::core::constants::DEFAULT_VIEWPORT_SIZE.0,
            crate::core::constants::DEFAULT_VIEWPORT_SIZE.1,
        )
    }
}

/// The rectangular block of tiles covering a viewport.
///
/// Bounds are inclusive tile indices and may lie outside the world: columns
/// wrap, rows outside `[0, 2^zoom)` have no tile. The top-left tile is drawn
/// at `(-offset_x, -offset_y)` relative to the viewport's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub zoom: u8,
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
    pub offset_x: u32,
    pub offset_y: u32,
    pub tile_size: u32,
}

/// One cell of a [`TileRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSlot {
    pub column: i64,
    pub row: i64,
    /// `None` when the row lies above or below the world.
    pub coord: Option<TileCoord>,
    /// Destination of the tile's top-left corner in viewport pixels.
    pub x: i64,
    pub y: i64,
}

impl TileRange {
    /// Computes the tile range for a viewport centered on `center`.
    pub fn resolve(center: &LatLng, zoom: u8, tile_size: u32, width: u32, height: u32) -> Self {
        let pixel = Mercator::to_pixel(center, zoom, tile_size);
        let ts = tile_size as i64;

        let (left, right, offset_x) = Self::resolve_axis(pixel.x as i64, ts, width as i64);
        let (top, bottom, offset_y) = Self::resolve_axis(pixel.y as i64, ts, height as i64);

        Self {
            zoom,
            left,
            right,
            top,
            bottom,
            offset_x,
            offset_y,
            tile_size,
        }
    }

    /// Resolves one axis: returns (first index, last index, offset).
    fn resolve_axis(center: i64, ts: i64, extent: i64) -> (i64, i64, u32) {
        let center_tile = center / ts;
        let local = center % ts;
        let before_half = extent / 2;
        let after_half = extent - before_half;

        let before = ceil_div(before_half - local, ts).max(0);
        let after = ceil_div(after_half + local - ts, ts).max(0);

        let first = center_tile - before;
        let mut last = center_tile + after;

        // A window of `extent` pixels can straddle ceil(extent/ts) + 1 tiles.
        let min_count = ceil_div(extent, ts) + 1;
        if last - first + 1 < min_count {
            last = first + min_count - 1;
        }

        // Both remainders truncate toward zero, so the outer one folds a
        // negative inner remainder back into [0, ts).
        let offset = (ts - (before_half - local) % ts) % ts;

        (first, last, offset as u32)
    }

    pub fn columns(&self) -> u32 {
        (self.right - self.left + 1) as u32
    }

    pub fn rows(&self) -> u32 {
        (self.bottom - self.top + 1) as u32
    }

    /// Number of slots in the range, saturating at `usize::MAX`.
    pub fn slot_count(&self) -> usize {
        let columns = (self.right - self.left + 1).max(0) as u64;
        let rows = (self.bottom - self.top + 1).max(0) as u64;
        usize::try_from(columns.saturating_mul(rows)).unwrap_or(usize::MAX)
    }

    /// Walks the range row by row, left to right.
    pub fn slots(&self) -> impl Iterator<Item = TileSlot> + '_ {
        let ts = self.tile_size as i64;
        (self.top..=self.bottom).flat_map(move |row| {
            (self.left..=self.right).map(move |column| TileSlot {
                column,
                row,
                coord: TileCoord::wrapped(self.zoom, column, row),
                x: (column - self.left) * ts - self.offset_x as i64,
                y: (row - self.top) * ts - self.offset_y as i64,
            })
        })
    }

    /// Existing tiles in the range, in render order.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.slots().filter_map(|slot| slot.coord)
    }
}

/// Ceiling division for a positive divisor.
fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && a > 0 {
        q + 1
    } else {
        q
    }
}
