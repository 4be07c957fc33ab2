use crate::core::constants::DECODED_CACHE_CAPACITY;
use crate::core::geo::TileCoord;
use crate::Result;
use image::RgbaImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory cache of decoded tile images using LRU eviction.
///
/// Only a decoding shortcut: the on-disk [`super::store::TileStore`] stays
/// the source of truth for what is cached. Clones share the same entries.
#[derive(Debug)]
pub struct TileCache {
    cache: Arc<Mutex<LruCache<TileCoord, Arc<RgbaImage>>>>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DECODED_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn get(&self, coord: &TileCoord) -> Option<Arc<RgbaImage>> {
        self.cache.lock().ok()?.get(coord).cloned()
    }

    pub fn put(&self, coord: TileCoord, image: Arc<RgbaImage>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(coord, image);
        }
    }

    /// Returns the decoded tile at `path`, decoding and remembering it on a miss.
    pub fn get_or_decode(&self, coord: TileCoord, path: &Path) -> Result<Arc<RgbaImage>> {
        if let Some(image) = self.get(&coord) {
            return Ok(image);
        }
        let image = Arc::new(image::open(path)?.to_rgba8());
        self.put(coord, Arc::clone(&image));
        Ok(image)
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.contains(coord))
            .unwrap_or(false)
    }

    /// Drops every decoded tile, e.g. after switching providers.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.cap().get())
            .unwrap_or(0)
    }
}

impl Clone for TileCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DECODED_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(color: [u8; 4]) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(4, 4, Rgba(color)))
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TileCache::new(2);
        let a = TileCoord::new(1, 1, 1);
        let b = TileCoord::new(2, 2, 2);
        let c = TileCoord::new(3, 3, 3);

        cache.put(a, solid([255, 0, 0, 255]));
        cache.put(b, solid([0, 255, 0, 255]));
        // Touch `a` so `b` becomes the oldest entry.
        assert!(cache.get(&a).is_some());
        cache.put(c, solid([0, 0, 255, 255]));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_falls_back_to_default() {
        assert_eq!(TileCache::new(0).capacity(), DECODED_CACHE_CAPACITY);
    }

    #[test]
    fn test_decode_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("0.png");
        RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let cache = TileCache::default();
        let coord = TileCoord::new(0, 0, 0);
        let image = cache.get_or_decode(coord, &path).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(3, 3), &Rgba([10, 20, 30, 255]));

        // Served from memory once the file is gone.
        std::fs::remove_file(&path).unwrap();
        assert!(cache.get_or_decode(coord, &path).is_ok());
        assert!(cache
            .get_or_decode(TileCoord::new(0, 0, 1), &tmp.path().join("missing.png"))
            .is_err());
    }
}
