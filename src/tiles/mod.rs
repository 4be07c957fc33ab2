pub mod cache;
pub mod loader;
pub mod patch;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use cache::TileCache;
pub use loader::{DownloadCoordinator, TileFetcher};
pub use patch::PatchSynthesizer;
pub use source::{ProviderRegistry, TileProvider};
pub use store::TileStore;
