//! Core constants derived from common web-map conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Lowest zoom level the engine accepts by default.
pub const MIN_ZOOM: u8 = 0;

/// Highest zoom level the engine accepts by default.
pub const MAX_ZOOM: u8 = 18;

/// Zoom level used when no initial zoom is configured.
pub const DEFAULT_ZOOM: u8 = 4;

/// Smallest crop (pixels per side) an ancestor patch may be built from.
/// Below this the upscaled patch is visually meaningless.
pub const MIN_PATCH_SIZE: u32 = 32;

/// Directory under the cache root that holds one folder per provider.
pub const CACHE_DIR_NAME: &str = "cache";

/// Default number of decoded tiles kept in memory.
pub const DECODED_CACHE_CAPACITY: usize = 256;

/// Default viewport size in pixels (width, height).
pub const DEFAULT_VIEWPORT_SIZE: (u32, u32) = (400, 300);
