use crate::core::constants::CACHE_DIR_NAME;
use crate::core::geo::TileCoord;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A tile server definition.
///
/// Every template is plain text with `%z`, `%x` and `%y` placeholders.
/// Nothing is validated beyond substitution: a malformed template yields a
/// malformed URL or path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileProvider {
    /// Human readable name shown by host UIs
    pub name: String,
    /// URL template, e.g. `https://tile.openstreetmap.org/%z/%x/%y.png`
    pub url: String,
    /// Folder under `<root>/cache` holding this provider's tiles
    pub folder: String,
    /// Directory template below the folder, e.g. `%z/%x`
    pub path: String,
    /// File name template, e.g. `%y.png`
    pub tile: String,
}

impl TileProvider {
    pub fn openstreetmap() -> Self {
        Self {
            name: "OpenStreetMap".to_string(),
            url: "https://tile.openstreetmap.org/%z/%x/%y.png".to_string(),
            folder: "osm".to_string(),
            path: "%z/%x".to_string(),
            tile: "%y.png".to_string(),
        }
    }

    /// URL of `coord` on the remote server.
    pub fn tile_url(&self, coord: TileCoord) -> String {
        self.url
            .replace("%z", &coord.z.to_string())
            .replace("%x", &coord.x.to_string())
            .replace("%y", &coord.y.to_string())
    }

    /// Directory of a tile column relative to the provider folder.
    pub fn file_path(&self, zoom: u8, x: u32) -> String {
        self.path
            .replace("%z", &zoom.to_string())
            .replace("%x", &x.to_string())
    }

    /// File name of a tile inside its column directory.
    pub fn file_name(&self, y: u32) -> String {
        self.tile.replace("%y", &y.to_string())
    }

    /// `<root>/cache/<folder>`
    pub fn cache_dir(&self, root: &Path) -> PathBuf {
        root.join(CACHE_DIR_NAME).join(&self.folder)
    }

    /// `<root>/cache/<folder>/<path>/<tile>`
    pub fn tile_path(&self, root: &Path, coord: TileCoord) -> PathBuf {
        self.cache_dir(root)
            .join(self.file_path(coord.z, coord.x))
            .join(self.file_name(coord.y))
    }

    fn problem(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("server has no name")
        } else if self.url.trim().is_empty() {
            Some("url template is empty")
        } else if self.folder.trim().is_empty() {
            Some("folder is empty")
        } else if self.path.trim().is_empty() {
            Some("file path template is empty")
        } else if self.tile.trim().is_empty() {
            Some("tile template is empty")
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderFile {
    providers: Vec<TileProvider>,
}

/// The list of configured tile servers and the one currently in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRegistry {
    providers: Vec<TileProvider>,
    selected: usize,
}

impl ProviderRegistry {
    /// Builds a registry from provider records, skipping unusable ones.
    ///
    /// Fails only when no usable provider remains.
    pub fn new(providers: Vec<TileProvider>) -> Result<Self> {
        let providers: Vec<_> = providers
            .into_iter()
            .filter(|provider| match provider.problem() {
                Some(problem) => {
                    log::warn!("skipping tile provider {:?}: {}", provider.name, problem);
                    false
                }
                None => true,
            })
            .collect();

        if providers.is_empty() {
            return Err(MapError::Config("no usable tile providers defined".to_string()));
        }

        Ok(Self {
            providers,
            selected: 0,
        })
    }

    /// Parses `{"providers": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ProviderFile = serde_json::from_str(json)
            .map_err(|e| MapError::Config(format!("malformed provider list: {}", e)))?;
        Self::new(file.providers)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MapError::Config(format!("couldn't open provider list {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn selected(&self) -> &TileProvider {
        &self.providers[self.selected]
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Selects the provider at `index`.
    ///
    /// An out-of-range index is ignored. Returns whether the selection
    /// actually changed.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.providers.len() || index == self.selected {
            return false;
        }
        self.selected = index;
        true
    }

    pub fn resolve_url(&self, coord: TileCoord) -> String {
        self.selected().tile_url(coord)
    }

    pub fn resolve_cache_folder(&self) -> &str {
        &self.selected().folder
    }

    pub fn resolve_file_path(&self, zoom: u8, x: u32) -> String {
        self.selected().file_path(zoom, x)
    }

    pub fn resolve_file_name(&self, y: u32) -> String {
        self.selected().file_name(y)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            providers: vec![TileProvider::openstreetmap()],
            selected: 0,
        }
    }
}
