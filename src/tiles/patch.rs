//! Stand-in images for tiles that are still downloading.
//!
//! A missing tile covers a quarter of its parent, a sixteenth of its
//! grandparent and so on. Cropping that area out of the nearest cached
//! ancestor and scaling it back up gives a blurry but correctly placed
//! preview until the real tile arrives.

use super::cache::TileCache;
use super::source::TileProvider;
use super::store::TileStore;
use crate::core::constants::{MIN_PATCH_SIZE, TILE_SIZE};
use crate::core::geo::TileCoord;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::Path;

/// Square area of a tile in that tile's own pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRegion {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl PatchRegion {
    pub fn full(tile_size: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            size: tile_size,
        }
    }

    /// The same area expressed in the parent of a tile at column `x`, row `y`.
    fn in_parent(self, x: u32, y: u32, tile_size: u32) -> Self {
        Self {
            x: ((x % 2) * tile_size + self.x) / 2,
            y: ((y % 2) * tile_size + self.y) / 2,
            size: self.size / 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Upscaled crop of the cached ancestor `source`
    Ancestor { source: TileCoord, image: RgbaImage },
    /// No usable ancestor; show the generic loading image
    Loading,
}

impl Patch {
    pub fn is_loading(&self) -> bool {
        matches!(self, Patch::Loading)
    }
}

/// Builds [`Patch`]es from cached ancestors. Never changes tile state.
#[derive(Debug, Clone, Copy)]
pub struct PatchSynthesizer {
    tile_size: u32,
    min_patch_size: u32,
}

impl PatchSynthesizer {
    pub fn new(tile_size: u32, min_patch_size: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
            min_patch_size: min_patch_size.max(1),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn min_patch_size(&self) -> u32 {
        self.min_patch_size
    }

    /// Patch for the whole of `coord`.
    pub fn synthesize(
        &self,
        coord: TileCoord,
        store: &TileStore,
        provider: &TileProvider,
        root: &Path,
        decoded: &TileCache,
    ) -> Patch {
        self.synthesize_region(
            coord,
            PatchRegion::full(self.tile_size),
            store,
            provider,
            root,
            decoded,
        )
    }

    /// Patch for the `region` of `coord`, walking up one zoom level per step.
    ///
    /// Gives up once the crop would be smaller than the minimum patch size
    /// or zoom 0 is passed. Ancestors that are cached but fail to decode are
    /// skipped.
    pub fn synthesize_region(
        &self,
        coord: TileCoord,
        region: PatchRegion,
        store: &TileStore,
        provider: &TileProvider,
        root: &Path,
        decoded: &TileCache,
    ) -> Patch {
        let mut child = coord;
        let mut region = region;

        while let Some(parent) = child.parent() {
            region = region.in_parent(child.x, child.y, self.tile_size);
            if region.size < self.min_patch_size {
                break;
            }

            if store.is_cached(&parent) {
                match decoded.get_or_decode(parent, &provider.tile_path(root, parent)) {
                    Ok(image) => {
                        return Patch::Ancestor {
                            source: parent,
                            image: self.crop_and_scale(&image, region),
                        };
                    }
                    Err(e) => log::warn!("can't decode cached tile {}: {}", parent, e),
                }
            }
            child = parent;
        }

        Patch::Loading
    }

    fn crop_and_scale(&self, image: &RgbaImage, region: PatchRegion) -> RgbaImage {
        // Tiles on disk are not always `tile_size` wide.
        let scale_x = image.width() as f64 / self.tile_size as f64;
        let scale_y = image.height() as f64 / self.tile_size as f64;
        let x = (region.x as f64 * scale_x) as u32;
        let y = (region.y as f64 * scale_y) as u32;
        let w = ((region.size as f64 * scale_x) as u32).clamp(1, image.width().saturating_sub(x).max(1));
        let h = ((region.size as f64 * scale_y) as u32).clamp(1, image.height().saturating_sub(y).max(1));

        let crop = imageops::crop_imm(image, x, y, w, h).to_image();
        imageops::resize(&crop, self.tile_size, self.tile_size, FilterType::Triangle)
    }
}

impl Default for PatchSynthesizer {
    fn default() -> Self {
        Self::new(TILE_SIZE, MIN_PATCH_SIZE)
    }
}
