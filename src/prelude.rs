//! Prelude module for common slipmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use slipmap::prelude::*;`

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

pub use crate::{Error as MapError, Result};

pub use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
