//! Tile state bookkeeping for the selected provider.
//!
//! Every tile is in at most one of three sets:
//! - **cached**: its bytes are on disk (size tracked in a running total)
//! - **unavailable**: the server said it does not exist; never asked again
//!   until the next reload
//! - **pending**: queued or downloading, with its resolved URL
//!
//! A tile in none of them is unknown and may be queued. The cached set is
//! not persisted separately: it is rebuilt from the directory tree
//! `<folder>/<zoom>/<x>/<y>.<ext>` on every reload.

use crate::core::geo::TileCoord;
use crate::prelude::{HashMap, HashSet};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct TileStore {
    dir: Option<PathBuf>,
    cached: HashMap<TileCoord, u64>,
    cached_bytes: u64,
    unavailable: HashSet<TileCoord>,
    pending: HashMap<TileCoord, String>,
    /// Enqueue order of `pending`
    queue: VecDeque<TileCoord>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store and scans `dir` for cached tiles.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let mut store = Self::new();
        store.reload(dir);
        store
    }

    /// Folder scanned by the last reload.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_cached(&self, id: &TileCoord) -> bool {
        self.cached.contains_key(id)
    }

    pub fn is_unavailable(&self, id: &TileCoord) -> bool {
        self.unavailable.contains(id)
    }

    pub fn is_pending(&self, id: &TileCoord) -> bool {
        self.pending.contains_key(id)
    }

    /// Queues `id` for download unless it is already known.
    ///
    /// Returns whether the tile was added.
    pub fn enqueue(&mut self, id: TileCoord, url: impl Into<String>) -> bool {
        if self.is_cached(&id) || self.is_unavailable(&id) || self.is_pending(&id) {
            return false;
        }
        self.pending.insert(id, url.into());
        self.queue.push_back(id);
        true
    }

    /// Records `id` as stored on disk with `byte_size` bytes.
    pub fn mark_cached(&mut self, id: TileCoord, byte_size: u64) {
        self.remove_pending(&id);
        self.unavailable.remove(&id);
        if let Some(previous) = self.cached.insert(id, byte_size) {
            self.cached_bytes -= previous;
        }
        self.cached_bytes += byte_size;
    }

    /// Forgets a cached tile whose file turned out to be unusable, so a
    /// later render pass queues it again.
    pub fn evict(&mut self, id: &TileCoord) -> bool {
        match self.cached.remove(id) {
            Some(size) => {
                self.cached_bytes -= size;
                true
            }
            None => false,
        }
    }

    /// Records that the server has no tile `id`.
    pub fn mark_unavailable(&mut self, id: TileCoord) {
        self.remove_pending(&id);
        if let Some(size) = self.cached.remove(&id) {
            self.cached_bytes -= size;
        }
        self.unavailable.insert(id);
    }

    /// Removes `id` from the pending queue without recording an outcome,
    /// so a later render pass can queue it again.
    pub fn drop_pending(&mut self, id: &TileCoord) -> bool {
        self.remove_pending(id).is_some()
    }

    /// Same as [`TileStore::drop_pending`].
    pub fn requeue(&mut self, id: &TileCoord) -> bool {
        self.drop_pending(id)
    }

    /// URL `id` was queued with, if it is pending.
    pub fn pending_url(&self, id: &TileCoord) -> Option<&str> {
        self.pending.get(id).map(String::as_str)
    }

    /// Pending entries in enqueue order.
    pub fn pending(&self) -> impl Iterator<Item = (TileCoord, &str)> + '_ {
        self.queue
            .iter()
            .filter_map(move |id| self.pending.get(id).map(|url| (*id, url.as_str())))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cached.len()
    }

    pub fn cached_bytes(&self) -> u64 {
        self.cached_bytes
    }

    pub fn unavailable_count(&self) -> usize {
        self.unavailable.len()
    }

    /// Forgets every tile and rebuilds the cached set from `dir`.
    ///
    /// A missing folder is an empty cache.
    pub fn reload(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.cached.clear();
        self.cached_bytes = 0;
        self.unavailable.clear();
        self.pending.clear();
        self.queue.clear();

        for (id, size) in scan_cache_dir(&dir) {
            self.cached.insert(id, size);
            self.cached_bytes += size;
        }
        log::info!(
            "scanned tile cache {}: {} tiles, {} bytes",
            dir.display(),
            self.cached.len(),
            self.cached_bytes
        );
        self.dir = Some(dir);
    }

    fn remove_pending(&mut self, id: &TileCoord) -> Option<String> {
        let url = self.pending.remove(id)?;
        self.queue.retain(|queued| queued != id);
        Some(url)
    }
}

/// Lists `<dir>/<zoom>/<x>/<y>.<ext>` files. Anything else is ignored.
fn scan_cache_dir(dir: &Path) -> Vec<(TileCoord, u64)> {
    let mut tiles = Vec::new();
    for (zoom, zoom_dir) in numeric_entries(dir, true) {
        let Ok(zoom) = u8::try_from(zoom) else {
            continue;
        };
        for (x, x_dir) in numeric_entries(&zoom_dir, true) {
            for (y, file) in numeric_entries(&x_dir, false) {
                let coord = TileCoord::new(x, y, zoom);
                if !coord.is_valid() {
                    continue;
                }
                match fs::metadata(&file) {
                    Ok(meta) => tiles.push((coord, meta.len())),
                    Err(e) => log::warn!("can't stat cached tile {}: {}", file.display(), e),
                }
            }
        }
    }
    tiles
}

/// Entries of `dir` whose name (or file stem) is a plain number.
fn numeric_entries(dir: &Path, want_dirs: bool) -> Vec<(u32, PathBuf)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("can't read tile cache directory {}: {}", dir.display(), e);
            }
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let file_type = entry.file_type().ok()?;
            let name = if want_dirs {
                if !file_type.is_dir() {
                    return None;
                }
                path.file_name()?.to_str()?.to_string()
            } else {
                if !file_type.is_file() || path.extension().is_none() {
                    return None;
                }
                path.file_stem()?.to_str()?.to_string()
            };
            let index = name.parse::<u32>().ok()?;
            Some((index, path))
        })
        .collect()
}
