//! Engine configuration
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! { "cache_root": "/var/tiles", "initial_zoom": 10 }
//! ```

use crate::core::constants::{
    DECODED_CACHE_CAPACITY, DEFAULT_VIEWPORT_SIZE, DEFAULT_ZOOM, MAX_ZOOM, MIN_PATCH_SIZE,
    MIN_ZOOM, TILE_SIZE,
};
use crate::core::geo::LatLng;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pixels per tile side
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Clamped into `min_zoom..=max_zoom` when the engine starts
    pub initial_zoom: u8,
    pub initial_center: LatLng,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Tiles are stored under `<cache_root>/cache/<provider folder>/`
    pub cache_root: PathBuf,
    pub max_concurrent_downloads: usize,
    /// Smallest ancestor crop, in pixels, worth upscaling into a patch
    pub min_patch_size: u32,
    /// Number of decoded tiles kept in memory
    pub decoded_cache_capacity: usize,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            initial_zoom: DEFAULT_ZOOM,
            initial_center: LatLng::default(),
            viewport_width: DEFAULT_VIEWPORT_SIZE.0,
            viewport_height: DEFAULT_VIEWPORT_SIZE.1,
            cache_root: PathBuf::from("."),
            max_concurrent_downloads: 1,
            min_patch_size: MIN_PATCH_SIZE,
            decoded_cache_capacity: DECODED_CACHE_CAPACITY,
            request_timeout_ms: 10_000,
            user_agent: concat!("slipmap/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EngineConfig {
    /// Small and fast settings for tests: tiny decoded cache, short timeout.
    pub fn for_testing() -> Self {
        Self {
            decoded_cache_capacity: 16,
            request_timeout_ms: 1_000,
            ..Self::default()
        }
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MapError::Config(format!("malformed engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MapError::Config(format!("couldn't open engine config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(MapError::Config("tile_size must be positive".to_string()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(MapError::Config(format!(
                "min_zoom {} is above max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        // World pixel coordinates are u32.
        let map_size = (self.tile_size as u64).checked_shl(self.max_zoom as u32);
        if map_size.map_or(true, |size| size > u32::MAX as u64 + 1) {
            return Err(MapError::Config(format!(
                "max_zoom {} is too deep for {}px tiles",
                self.max_zoom, self.tile_size
            )));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(MapError::Config(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
