//! Fills the disk cache around a location without any UI.
//!
//! ```text
//! RUST_LOG=debug cargo run --example headless -- 61.4981 23.7610 12 [providers.json]
//! ```

use slipmap::prelude::*;
use slipmap::HttpFetcher;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let lat = args.first().and_then(|a| a.parse().ok()).unwrap_or(61.4981);
    let lng = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(23.7610);
    let zoom = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(12);
    let providers = match args.get(3) {
        Some(path) => ProviderRegistry::load(path)?,
        None => ProviderRegistry::default(),
    };

    let config = EngineConfig {
        initial_center: LatLng::new(lat, lng),
        initial_zoom: zoom,
        viewport_width: 800,
        viewport_height: 600,
        ..EngineConfig::default()
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let fetcher = HttpFetcher::from_config(runtime.handle().clone(), &config)?;
    let mut engine = TileEngine::new(config, providers, fetcher)?;

    println!("providers: {}", engine.provider_names().join(", "));
    println!(
        "center {:.4},{:.4} at zoom {}: {:?}",
        lat,
        lng,
        engine.zoom(),
        engine.tile_range()
    );

    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        let tiles = engine.render();
        let ready = tiles.iter().filter(|t| t.image.is_cached()).count();
        let stats = engine.stats();
        println!(
            "{}/{} tiles on disk, {} pending, {} unavailable, {} bytes cached",
            ready,
            tiles.len(),
            stats.pending,
            stats.unavailable,
            stats.cached_bytes
        );

        if stats.pending == 0 || Instant::now() > deadline {
            break;
        }
        while engine.poll() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    Ok(())
}
