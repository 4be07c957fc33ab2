//! # slipmap
//!
//! A slippy map tile engine: square raster tiles are fetched from a remote
//! provider, cached under a per-provider directory tree, and resolved into
//! a viewport.
//!
//! The engine owns no UI. A host drives it through [`TileEngine`]: it moves
//! the center, changes zoom or viewport size, calls [`TileEngine::render`]
//! to get one image per visible tile, and calls [`TileEngine::poll`] to feed
//! finished downloads back in.

pub mod core;
pub mod tiles;
pub mod prelude;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::EngineConfig,
    geo::{LatLng, PixelCoord, TileCoord},
    map::{CacheStats, Placeholder, RenderedTile, TileEngine, TileImage},
    projection::Mercator,
    viewport::{TileRange, Viewport},
};

pub use crate::tiles::{
    cache::TileCache,
    loader::{
        Completed, DownloadCoordinator, DownloadState, FetchCompletion, FetchOutcome, FetchRequest,
        TileFetcher,
    },
    patch::{Patch, PatchRegion, PatchSynthesizer},
    source::{ProviderRegistry, TileProvider},
    store::TileStore,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::tiles::loader::HttpFetcher;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tile not found: {0}")]
    NotFound(String),

    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Invalid zoom {zoom}: allowed range is {min}..={max}")]
    InvalidZoom { zoom: i32, min: u8, max: u8 },
}

/// Error type alias for convenience
pub type Error = MapError;
