use crate::{
    core::{
        config::EngineConfig,
        geo::{LatLng, TileCoord},
        viewport::{TileRange, Viewport},
    },
    tiles::{
        cache::TileCache,
        loader::{DownloadCoordinator, DownloadState, TileFetcher},
        patch::{Patch, PatchSynthesizer},
        source::{ProviderRegistry, TileProvider},
        store::TileStore,
    },
    Result,
};
use image::RgbaImage;
use std::sync::Arc;

/// Generic images a host draws when there is nothing better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The tile is on its way
    Loading,
    /// The server does not have this tile
    Unavailable,
}

/// What to draw for one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileImage {
    /// The real tile, decoded from the disk cache
    Cached(Arc<RgbaImage>),
    /// Upscaled crop of the cached ancestor `source`
    Patch { source: TileCoord, image: RgbaImage },
    Placeholder(Placeholder),
}

impl TileImage {
    pub fn is_cached(&self) -> bool {
        matches!(self, TileImage::Cached(_))
    }
}

/// One visible tile and where its top-left corner goes in the viewport.
///
/// `x`/`y` can be negative: edge tiles hang over the viewport border.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTile {
    pub coord: TileCoord,
    pub x: i64,
    pub y: i64,
    pub image: TileImage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cached_tiles: usize,
    pub cached_bytes: u64,
    pub pending: usize,
    pub unavailable: usize,
    pub in_flight: usize,
}

/// The tile engine a host UI drives.
///
/// All state lives on the host's thread. Downloads run wherever the
/// [`TileFetcher`] puts them and report back through a channel that
/// [`TileEngine::poll`] drains.
pub struct TileEngine {
    config: EngineConfig,
    viewport: Viewport,
    providers: ProviderRegistry,
    store: TileStore,
    downloads: DownloadCoordinator,
    fetcher: Box<dyn TileFetcher>,
    patches: PatchSynthesizer,
    decoded: TileCache,
}

impl TileEngine {
    /// Validates `config` and scans the selected provider's cache folder.
    pub fn new(
        config: EngineConfig,
        providers: ProviderRegistry,
        fetcher: impl TileFetcher + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let mut viewport = Viewport::new(
            config.initial_center,
            config.min_zoom,
            config.viewport_width,
            config.viewport_height,
        )
        .with_tile_size(config.tile_size)
        .with_zoom_bounds(config.min_zoom, config.max_zoom);
        viewport.set_zoom(config.initial_zoom.clamp(config.min_zoom, config.max_zoom) as i32)?;

        let store = TileStore::open(providers.selected().cache_dir(&config.cache_root));
        log::info!(
            "tile engine ready: provider {:?}, zoom {}, {}x{}",
            providers.selected().name,
            viewport.zoom(),
            config.viewport_width,
            config.viewport_height
        );

        Ok(Self {
            viewport,
            store,
            providers,
            downloads: DownloadCoordinator::new(config.max_concurrent_downloads),
            fetcher: Box::new(fetcher),
            patches: PatchSynthesizer::new(config.tile_size, config.min_patch_size),
            decoded: TileCache::new(config.decoded_cache_capacity),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn center(&self) -> LatLng {
        self.viewport.center
    }

    pub fn zoom(&self) -> u8 {
        self.viewport.zoom()
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn download_state(&self) -> DownloadState {
        self.downloads.state()
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.viewport.set_center(center);
    }

    pub fn set_zoom(&mut self, zoom: i32) -> Result<()> {
        self.viewport.set_zoom(zoom)
    }

    pub fn zoom_in(&mut self) -> Result<()> {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> Result<()> {
        self.viewport.zoom_out()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.resize(width, height);
    }

    /// Moves the map by a drag delta in screen pixels.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn tile_range(&self) -> TileRange {
        self.viewport.tile_range()
    }

    /// Resolves every visible tile to an image.
    ///
    /// Tiles that are neither cached nor unavailable are queued for
    /// download and shown as a patch or the loading placeholder. So are
    /// cached tiles whose file no longer decodes. Queued tiles start
    /// downloading before this returns.
    pub fn render(&mut self) -> Vec<RenderedTile> {
        let range = self.viewport.tile_range();
        let root = self.config.cache_root.as_path();
        let provider = self.providers.selected();

        let mut rendered = Vec::with_capacity(range.slot_count());
        for slot in range.slots() {
            let Some(coord) = slot.coord else {
                continue;
            };

            let image = if self.store.is_unavailable(&coord) {
                TileImage::Placeholder(Placeholder::Unavailable)
            } else {
                let cached = if self.store.is_cached(&coord) {
                    match self
                        .decoded
                        .get_or_decode(coord, &provider.tile_path(root, coord))
                    {
                        Ok(image) => Some(TileImage::Cached(image)),
                        Err(e) => {
                            log::warn!("can't decode cached tile {}, fetching again: {}", coord, e);
                            self.store.evict(&coord);
                            self.store.enqueue(coord, provider.tile_url(coord));
                            None
                        }
                    }
                } else {
                    self.store.enqueue(coord, provider.tile_url(coord));
                    None
                };

                cached.unwrap_or_else(|| {
                    match self
                        .patches
                        .synthesize(coord, &self.store, provider, root, &self.decoded)
                    {
                        Patch::Ancestor { source, image } => TileImage::Patch { source, image },
                        Patch::Loading => TileImage::Placeholder(Placeholder::Loading),
                    }
                })
            };

            rendered.push(RenderedTile {
                coord,
                x: slot.x,
                y: slot.y,
                image,
            });
        }

        self.downloads.drain(&self.store, self.fetcher.as_ref());
        rendered
    }

    /// Applies every finished download. Returns how many were handled.
    ///
    /// A host calls this from its event loop and renders again when the
    /// count is non-zero.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(completion) = self.downloads.try_recv() {
            self.downloads.on_completion(
                completion,
                &mut self.store,
                self.providers.selected(),
                &self.config.cache_root,
                self.fetcher.as_ref(),
            );
            handled += 1;
        }
        handled
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.names()
    }

    pub fn selected_provider(&self) -> &TileProvider {
        self.providers.selected()
    }

    pub fn selected_provider_index(&self) -> usize {
        self.providers.selected_index()
    }

    /// Switches to provider `index` and reloads its cache.
    ///
    /// Returns false, and leaves everything alone, when `index` is out of
    /// range or already selected. Downloads still in flight finish but
    /// their results are thrown away.
    pub fn select_provider(&mut self, index: usize) -> bool {
        if !self.providers.select(index) {
            return false;
        }
        log::info!("switched tile provider to {:?}", self.providers.selected().name);
        self.reload_cache();
        true
    }

    /// Forgets all tile state and rescans the selected provider's folder.
    pub fn reload_cache(&mut self) {
        self.decoded.clear();
        self.store
            .reload(self.providers.selected().cache_dir(&self.config.cache_root));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_tiles: self.store.cached_count(),
            cached_bytes: self.store.cached_bytes(),
            pending: self.store.pending_count(),
            unavailable: self.store.unavailable_count(),
            in_flight: self.downloads.in_flight(),
        }
    }
}
