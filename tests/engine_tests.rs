use crossbeam_channel::Sender;
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use slipmap::prelude::*;
use slipmap::{DownloadState, Placeholder};
use std::io::Cursor;

/// Records every fetch and answers only when told to.
#[derive(Clone, Default)]
struct ScriptedFetcher {
    issued: Arc<Mutex<Vec<(FetchRequest, Sender<FetchCompletion>)>>>,
}

impl ScriptedFetcher {
    fn requests(&self) -> Vec<FetchRequest> {
        self.issued
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    fn answer(&self, index: usize, outcome: FetchOutcome) {
        let (request, done) = self.issued.lock().unwrap()[index].clone();
        done.send(FetchCompletion::answering(request, outcome)).unwrap();
    }
}

impl TileFetcher for ScriptedFetcher {
    fn fetch(&self, request: FetchRequest, done: Sender<FetchCompletion>) {
        self.issued.lock().unwrap().push((request, done));
    }
}

const TAMPERE: LatLng = LatLng {
    lat: 61.4667,
    lng: 23.8564,
};

fn png(color: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(256, 256, Rgba(color)))
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn write_tile(root: &Path, provider: &TileProvider, coord: TileCoord, bytes: &[u8]) {
    let path = provider.tile_path(root, coord);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn satellite() -> TileProvider {
    TileProvider {
        name: "Satellite".to_string(),
        url: "https://sat.example.com/%z/%x/%y.png".to_string(),
        folder: "sat".to_string(),
        path: "%z/%x".to_string(),
        tile: "%y.png".to_string(),
    }
}

fn tampere_engine(root: &Path, providers: ProviderRegistry) -> (TileEngine, ScriptedFetcher) {
    let config = EngineConfig {
        initial_center: TAMPERE,
        initial_zoom: 4,
        viewport_width: 400,
        viewport_height: 300,
        ..EngineConfig::for_testing().with_cache_root(root)
    };
    let fetcher = ScriptedFetcher::default();
    let engine = TileEngine::new(config, providers, fetcher.clone()).unwrap();
    (engine, fetcher)
}

/// Answers every request, including the ones each answer triggers.
fn answer_everything(
    engine: &mut TileEngine,
    fetcher: &ScriptedFetcher,
    outcome: impl Fn(&FetchRequest) -> FetchOutcome,
) {
    let mut answered = 0;
    while answered < fetcher.requests().len() {
        let request = fetcher.requests()[answered].clone();
        fetcher.answer(answered, outcome(&request));
        assert_eq!(engine.poll(), 1);
        answered += 1;
    }
}

#[test]
fn test_first_render_shows_placeholders_and_fetches_one_tile() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    let range = engine.tile_range();
    assert!(range.columns() >= 3 && range.rows() >= 3);
    assert!(range.offset_x < 256 && range.offset_y < 256);

    let tiles = engine.render();
    assert!(tiles.len() >= 9);
    assert!(tiles.iter().any(|t| t.coord == TileCoord::new(9, 4, 4)));
    assert!(tiles
        .iter()
        .all(|t| t.image == TileImage::Placeholder(Placeholder::Loading)));

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].coord, tiles[0].coord);
    assert_eq!(
        requests[0].url,
        format!(
            "https://tile.openstreetmap.org/4/{}/{}.png",
            tiles[0].coord.x, tiles[0].coord.y
        )
    );
    assert_eq!(engine.stats().pending, tiles.len());
}

#[test]
fn test_never_two_fetches_at_once() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    for _ in 0..5 {
        engine.render();
        assert_eq!(engine.poll(), 0);
        engine.pan(40, -25);
    }
    assert_eq!(fetcher.requests().len(), 1);
    assert_eq!(engine.download_state(), DownloadState::Downloading);
    assert!(engine.stats().pending > 1);
}

#[test]
fn test_downloads_fill_the_disk_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    let visible = engine.render().len();
    answer_everything(&mut engine, &fetcher, |_| {
        FetchOutcome::Body(png([30, 60, 90, 255]))
    });

    assert_eq!(fetcher.requests().len(), visible);
    assert_eq!(engine.download_state(), DownloadState::Idle);

    let stats = engine.stats();
    assert_eq!(stats.cached_tiles, visible);
    assert_eq!(stats.pending, 0);
    assert!(stats.cached_bytes > 0);

    let tiles = engine.render();
    assert!(tiles.iter().all(|t| t.image.is_cached()));
    let osm = TileProvider::openstreetmap();
    for tile in &tiles {
        assert!(osm.tile_path(tmp.path(), tile.coord).is_file());
    }

    // A fresh engine finds the same tiles on disk.
    let (reopened, _) = tampere_engine(tmp.path(), ProviderRegistry::default());
    assert_eq!(reopened.stats().cached_tiles, visible);
    assert_eq!(reopened.stats().cached_bytes, stats.cached_bytes);
}

#[test]
fn test_missing_tile_is_not_requested_again() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    let first = engine.render()[0].coord;
    fetcher.answer(0, FetchOutcome::NotFound);
    engine.poll();

    for _ in 0..3 {
        let tiles = engine.render();
        let tile = tiles.iter().find(|t| t.coord == first).unwrap();
        assert_eq!(tile.image, TileImage::Placeholder(Placeholder::Unavailable));
    }

    let first_url = TileProvider::openstreetmap().tile_url(first);
    let asked = fetcher
        .requests()
        .iter()
        .filter(|r| r.url == first_url)
        .count();
    assert_eq!(asked, 1);
    assert_eq!(engine.stats().unavailable, 1);
}

#[test]
fn test_failed_tile_is_retried_on_a_later_pass() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    let visible = engine.render().len();
    let failed = fetcher.requests()[0].url.clone();
    answer_everything(&mut engine, &fetcher, |request| {
        if request.url == failed {
            FetchOutcome::Failed("HTTP 503".to_string())
        } else {
            FetchOutcome::Body(png([1, 2, 3, 255]))
        }
    });
    assert_eq!(engine.stats().cached_tiles, visible - 1);
    assert_eq!(engine.stats().pending, 0);

    // The next pass queues it again.
    engine.render();
    let requests = fetcher.requests();
    assert_eq!(requests.len(), visible + 1);
    assert_eq!(requests[visible].url, failed);
}

#[test]
fn test_tiles_sharing_a_url_settle() {
    let tmp = tempfile::tempdir().unwrap();
    let columns = TileProvider {
        name: "Columns".to_string(),
        url: "http://t/%z/%x.png".to_string(),
        ..TileProvider::openstreetmap()
    };
    let providers = ProviderRegistry::new(vec![columns]).unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), providers);

    let visible = engine.render().len();
    answer_everything(&mut engine, &fetcher, |_| {
        FetchOutcome::Body(png([5, 5, 5, 255]))
    });

    assert_eq!(fetcher.requests().len(), visible);
    assert_eq!(engine.download_state(), DownloadState::Idle);
    let stats = engine.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.cached_tiles, visible);

    assert!(engine.render().iter().all(|t| t.image.is_cached()));
    assert_eq!(fetcher.requests().len(), visible);
}

#[test]
fn test_undecodable_cached_tile_is_fetched_again() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    let osm = TileProvider::openstreetmap();
    let broken = engine.tile_range().tiles().next().unwrap();
    write_tile(tmp.path(), &osm, broken, b"not a png");
    engine.reload_cache();
    assert!(engine.store().is_cached(&broken));

    let tiles = engine.render();
    let tile = tiles.iter().find(|t| t.coord == broken).unwrap();
    assert_eq!(tile.image, TileImage::Placeholder(Placeholder::Loading));
    assert!(!engine.store().is_cached(&broken));
    assert!(engine.store().is_pending(&broken));
    assert_eq!(engine.stats().cached_bytes, 0);
    assert_eq!(fetcher.requests()[0].coord, broken);

    fetcher.answer(0, FetchOutcome::Body(png([7, 7, 7, 255])));
    assert_eq!(engine.poll(), 1);
    let tiles = engine.render();
    let tile = tiles.iter().find(|t| t.coord == broken).unwrap();
    assert!(tile.image.is_cached());
}

#[test]
fn test_patches_from_cached_parents() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, _fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    let osm = TileProvider::openstreetmap();
    let tile_png = png([200, 100, 0, 255]);
    for coord in engine.tile_range().tiles() {
        if let Some(parent) = coord.parent() {
            write_tile(tmp.path(), &osm, parent, &tile_png);
        }
    }
    engine.reload_cache();

    for tile in engine.render() {
        match tile.image {
            TileImage::Patch { source, image } => {
                assert_eq!(Some(source), tile.coord.parent());
                assert_eq!(image.dimensions(), (256, 256));
                assert_eq!(image.get_pixel(10, 200), &Rgba([200, 100, 0, 255]));
            }
            other => panic!("expected a patch for {}, got {:?}", tile.coord, other),
        }
    }
}

#[test]
fn test_provider_switch_discards_stale_downloads() {
    let tmp = tempfile::tempdir().unwrap();
    let sat = satellite();
    write_tile(tmp.path(), &sat, TileCoord::new(0, 0, 0), &png([0, 0, 0, 255]));
    write_tile(tmp.path(), &sat, TileCoord::new(1, 1, 1), &png([0, 0, 0, 255]));

    let providers = ProviderRegistry::new(vec![TileProvider::openstreetmap(), sat.clone()]).unwrap();
    let (mut engine, fetcher) = tampere_engine(tmp.path(), providers);

    engine.render();
    assert!(engine.stats().pending >= 5);
    let stale = fetcher.requests()[0].clone();

    assert!(engine.select_provider(1));
    assert_eq!(engine.selected_provider().folder, "sat");
    let stats = engine.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.cached_tiles, 2);
    assert_eq!(
        engine.store().dir(),
        Some(sat.cache_dir(tmp.path()).as_path())
    );

    // The old fetch still holds the only download slot.
    engine.render();
    assert_eq!(fetcher.requests().len(), 1);

    fetcher.answer(0, FetchOutcome::Body(png([9, 9, 9, 255])));
    assert_eq!(engine.poll(), 1);

    let osm = TileProvider::openstreetmap();
    assert!(!osm.tile_path(tmp.path(), stale.coord).exists());
    assert!(!sat.tile_path(tmp.path(), stale.coord).exists());
    assert!(!engine.store().is_cached(&stale.coord));

    // The freed slot goes to the new provider.
    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].url.starts_with("https://sat.example.com/4/"));
}

#[test]
fn test_zoom_and_pan_change_the_visible_tiles() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut engine, _fetcher) = tampere_engine(tmp.path(), ProviderRegistry::default());

    engine.zoom_in().unwrap();
    assert_eq!(engine.zoom(), 5);
    assert!(engine.render().iter().all(|t| t.coord.z == 5));

    let before = engine.tile_range();
    engine.pan(-512, 0);
    let after = engine.tile_range();
    assert_eq!(after.left, before.left + 2);
    assert!((after.offset_x as i64 - before.offset_x as i64).abs() <= 1);

    assert!(matches!(
        engine.set_zoom(19),
        Err(MapError::InvalidZoom { zoom: 19, .. })
    ));
    assert_eq!(engine.zoom(), 5);
}
