use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use super::source::TileProvider;
use super::store::TileStore;
use crate::core::geo::TileCoord;
use crate::prelude::HashSet;
use crate::{MapError, Result};
use std::fs;
use std::path::Path;

/// A tile download handed to a [`TileFetcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub coord: TileCoord,
    pub url: String,
}

/// How a fetch ended, as classified by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Response body
    Body(Vec<u8>),
    /// The server has no such tile
    NotFound,
    /// Anything else; the tile may be asked for again later
    Failed(String),
}

impl From<Result<Vec<u8>>> for FetchOutcome {
    fn from(result: Result<Vec<u8>>) -> Self {
        match result {
            Ok(bytes) => FetchOutcome::Body(bytes),
            Err(MapError::NotFound(_)) => FetchOutcome::NotFound,
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

/// Result of a fetch, sent back to the coordinator over its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub coord: TileCoord,
    pub url: String,
    pub outcome: FetchOutcome,
}

impl FetchCompletion {
    pub fn new(coord: TileCoord, url: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self {
            coord,
            url: url.into(),
            outcome,
        }
    }

    /// Completion answering `request`.
    pub fn answering(request: FetchRequest, outcome: FetchOutcome) -> Self {
        Self::new(request.coord, request.url, outcome)
    }
}

/// Transport used by the coordinator.
///
/// `fetch` must not block: it starts the request wherever it likes and
/// sends exactly one [`FetchCompletion`] on `done` when it ends.
pub trait TileFetcher: Send + Sync {
    fn fetch(&self, request: FetchRequest, done: Sender<FetchCompletion>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// Nothing in flight
    Idle,
    /// At least one fetch outstanding
    Downloading,
}

/// What a completion did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completed {
    Cached(TileCoord),
    Unavailable(TileCoord),
    /// Removed from pending so a later pass can retry it
    Dropped(TileCoord),
    /// The tile is no longer pending under the fetched URL
    Discarded,
}

/// Drains the pending queue of a [`TileStore`] through a [`TileFetcher`],
/// keeping at most `limit` fetches in flight.
///
/// Pending entries are issued in enqueue order. With the default limit of
/// one this is a two-state machine: `Idle` issues the oldest pending entry
/// and becomes `Downloading`; `Downloading` accepts new queue entries but
/// issues nothing until the outstanding fetch completes.
pub struct DownloadCoordinator {
    limit: usize,
    /// Tiles with an outstanding fetch
    in_flight: HashSet<TileCoord>,
    done_tx: Sender<FetchCompletion>,
    done_rx: Receiver<FetchCompletion>,
    issued: u64,
}

impl DownloadCoordinator {
    pub fn new(limit: usize) -> Self {
        let (done_tx, done_rx) = unbounded();
        Self {
            limit: limit.max(1),
            in_flight: HashSet::default(),
            done_tx,
            done_rx,
            issued: 0,
        }
    }

    pub fn state(&self) -> DownloadState {
        if self.in_flight.is_empty() {
            DownloadState::Idle
        } else {
            DownloadState::Downloading
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total fetches issued since creation.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Next finished fetch, if any, without blocking.
    pub fn try_recv(&self) -> Option<FetchCompletion> {
        match self.done_rx.try_recv() {
            Ok(completion) => Some(completion),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Issues pending entries while a slot is free. Returns how many were issued.
    pub fn drain(&mut self, store: &TileStore, fetcher: &dyn TileFetcher) -> usize {
        let free = self.limit.saturating_sub(self.in_flight.len());
        if free == 0 {
            return 0;
        }

        let batch: Vec<FetchRequest> = store
            .pending()
            .filter(|(coord, _)| !self.in_flight.contains(coord))
            .take(free)
            .map(|(coord, url)| FetchRequest {
                coord,
                url: url.to_string(),
            })
            .collect();

        let count = batch.len();
        for request in batch {
            log::debug!("fetching tile {} from {}", request.coord, request.url);
            self.in_flight.insert(request.coord);
            self.issued += 1;
            fetcher.fetch(request, self.done_tx.clone());
        }
        count
    }

    /// Applies a finished fetch to `store`, then drains the next entries.
    ///
    /// Tile bytes are written to `provider`'s path under `root`.
    pub fn on_completion(
        &mut self,
        completion: FetchCompletion,
        store: &mut TileStore,
        provider: &TileProvider,
        root: &Path,
        fetcher: &dyn TileFetcher,
    ) -> Completed {
        let completed = self.apply(completion, store, provider, root);
        self.drain(store, fetcher);
        completed
    }

    fn apply(
        &mut self,
        completion: FetchCompletion,
        store: &mut TileStore,
        provider: &TileProvider,
        root: &Path,
    ) -> Completed {
        let FetchCompletion {
            coord,
            url,
            outcome,
        } = completion;
        if !self.in_flight.remove(&coord) {
            log::warn!("completion for tile {} was never issued", coord);
        }

        // A reload or provider switch may have cleared or re-resolved the
        // entry while the fetch was in flight.
        if store.pending_url(&coord) != Some(url.as_str()) {
            log::debug!("discarding stale download of tile {} from {}", coord, url);
            return Completed::Discarded;
        }

        match outcome {
            FetchOutcome::Body(bytes) if bytes.is_empty() => {
                log::warn!("tile {} came back empty, will retry later", coord);
                store.drop_pending(&coord);
                Completed::Dropped(coord)
            }
            FetchOutcome::Body(bytes) => {
                match persist_tile(&provider.tile_path(root, coord), &bytes) {
                    Ok(size) => {
                        log::debug!("cached tile {} ({} bytes)", coord, size);
                        store.mark_cached(coord, size);
                        Completed::Cached(coord)
                    }
                    Err(e) => {
                        log::warn!("tile {}: {}", coord, e);
                        store.drop_pending(&coord);
                        Completed::Dropped(coord)
                    }
                }
            }
            FetchOutcome::NotFound => {
                log::debug!("tile {} does not exist on the server", coord);
                store.mark_unavailable(coord);
                Completed::Unavailable(coord)
            }
            FetchOutcome::Failed(reason) => {
                log::warn!("tile {} download failed: {}", coord, reason);
                store.drop_pending(&coord);
                Completed::Dropped(coord)
            }
        }
    }
}

impl Default for DownloadCoordinator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Writes tile bytes, creating the column directory as needed.
///
/// Bytes go to a hidden sibling first and are renamed into place, so an
/// interrupted write never leaves a truncated tile under its final name.
fn persist_tile(path: &Path, bytes: &[u8]) -> Result<u64> {
    let persist_err = |e: std::io::Error| MapError::Persist(format!("{}: {}", path.display(), e));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(persist_err)?;
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = path.with_file_name(format!(".{}.part", name));
    if let Err(e) = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(persist_err(e));
    }
    Ok(bytes.len() as u64)
}

#[cfg(feature = "tokio-runtime")]
pub use http::HttpFetcher;

#[cfg(feature = "tokio-runtime")]
mod http {
    use super::{FetchCompletion, FetchOutcome, FetchRequest, TileFetcher};
    use crate::core::config::EngineConfig;
    use crate::{MapError, Result};
    use crossbeam_channel::Sender;
    use once_cell::sync::Lazy;
    use reqwest::StatusCode;
    use std::time::Duration;

    /// Shared async HTTP client with a User-Agent so that public tile
    /// servers (e.g. OpenStreetMap) don't reject the request.
    pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        reqwest::Client::builder()
            .user_agent(concat!("slipmap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest async client")
    });

    /// Fetches tiles over HTTP on a tokio runtime.
    #[derive(Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
        runtime: tokio::runtime::Handle,
    }

    impl HttpFetcher {
        /// Uses the shared client and spawns on `runtime`.
        pub fn new(runtime: tokio::runtime::Handle) -> Self {
            Self {
                client: HTTP_CLIENT.clone(),
                runtime,
            }
        }

        /// Uses the shared client on the runtime this is called from.
        pub fn current() -> Result<Self> {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| MapError::Config(format!("no tokio runtime: {}", e)))?;
            Ok(Self::new(runtime))
        }

        /// Builds a dedicated client with the configured agent and timeout.
        pub fn from_config(runtime: tokio::runtime::Handle, config: &EngineConfig) -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(config.user_agent.as_str())
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()
                .map_err(|e| MapError::Config(format!("can't build HTTP client: {}", e)))?;
            Ok(Self { client, runtime })
        }

        async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| MapError::TransientFetch(e.to_string()))?;
            check_status(response.status(), url)?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| MapError::TransientFetch(e.to_string()))?;
            Ok(bytes.to_vec())
        }
    }

    impl TileFetcher for HttpFetcher {
        fn fetch(&self, request: FetchRequest, done: Sender<FetchCompletion>) {
            let client = self.client.clone();
            self.runtime.spawn(async move {
                let outcome = FetchOutcome::from(Self::download(&client, &request.url).await);
                let _ = done.send(FetchCompletion::answering(request, outcome));
            });
        }
    }

    /// 404 and 410 mean the tile does not exist; any other failure is transient.
    pub(crate) fn check_status(status: StatusCode, url: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            Err(MapError::NotFound(url.to_string()))
        } else {
            Err(MapError::TransientFetch(format!("HTTP {} for {}", status, url)))
        }
    }

}
