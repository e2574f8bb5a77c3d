//! vsf-slide - Inspect and read tiles from VSF whole slide images.
//!
//! This binary wires the library's slide handle and tile cache into a small
//! command line tool.

use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vsf_slide::{
    config::{CheckConfig, Cli, Command, InfoConfig, ScanConfig, TileConfig},
    format,
    format::required_focal_planes,
    slide::VsfSlide,
    tile::{ExportFormat, TileCache, TileEncoder},
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match &cli.command {
        Command::Check(config) => run_check(config),
        Command::Info(config) => run_info(config, cli.cache_size),
        Command::Tile(config) => run_tile(config, cli.cache_size),
        Command::Scan(config) => run_scan(config, cli.cache_size),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "vsf_slide=debug"
    } else {
        "vsf_slide=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_slide(path: &std::path::Path, cache_size: u64) -> Option<VsfSlide> {
    match VsfSlide::open_with_cache(path, TileCache::shared(cache_size)) {
        Ok(slide) => Some(slide),
        Err(e) => {
            error!("Failed to open {}: {}", path.display(), e);
            None
        }
    }
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: &CheckConfig) -> ExitCode {
    println!("VSF Container Check");
    println!("═══════════════════");
    println!();

    match format::check(&config.path) {
        Ok(descriptor) => {
            println!("✓ Index: {}", config.path.display());
            println!("✓ Version: {}", descriptor.version);
            println!(
                "✓ Level files: {} level(s) x {} focal plane(s)",
                descriptor.level_count,
                required_focal_planes(&descriptor).count()
            );
            println!();
            println!("✓ All checks passed!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: &InfoConfig, cache_size: u64) -> ExitCode {
    let Some(slide) = open_slide(&config.path, cache_size) else {
        return ExitCode::FAILURE;
    };

    let levels: Vec<_> = (0..slide.level_count())
        .filter_map(|i| slide.level_info(i))
        .collect();

    if config.json {
        let json = serde_json::json!({
            "path": slide.path().display().to_string(),
            "descriptor": slide.descriptor(),
            "levels": levels,
            "properties": slide.properties(),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize slide info: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let d = slide.descriptor();
    println!("{}", slide.path().display());
    println!("  Version:     {}", d.version);
    println!("  Dimensions:  {} x {}", d.width, d.height);
    println!("  Tile size:   {} x {}", d.tile_width, d.tile_height);
    println!();
    println!("  Level  Width      Height     Tiles      Downsample");
    for (i, level) in levels.iter().enumerate() {
        println!(
            "  {:<5}  {:<9}  {:<9}  {:<9}  {}",
            i,
            level.width,
            level.height,
            format!("{}x{}", level.tiles_x, level.tiles_y),
            level.downsample
        );
    }
    println!();
    for (key, value) in slide.properties().iter() {
        println!("  {} = {}", key, value);
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Tile Command
// =============================================================================

fn run_tile(config: &TileConfig, cache_size: u64) -> ExitCode {
    let format = match ExportFormat::from_path(&config.output) {
        Ok(format) => format,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some(slide) = open_slide(&config.path, cache_size) else {
        return ExitCode::FAILURE;
    };

    let tile = match slide.read_tile(config.level, config.col, config.row) {
        Ok(tile) => tile,
        Err(e) => {
            error!("Failed to read tile: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let encoder = TileEncoder::new(config.quality).with_background(slide.descriptor().background);
    let encoded = match encoder.encode(&tile, format) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&config.output, &encoded) {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {}x{} tile to {} ({} bytes)",
        tile.width(),
        tile.height(),
        config.output.display(),
        encoded.len()
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Scan Command
// =============================================================================

fn run_scan(config: &ScanConfig, cache_size: u64) -> ExitCode {
    let Some(slide) = open_slide(&config.path, cache_size) else {
        return ExitCode::FAILURE;
    };

    let Some((tiles_x, tiles_y)) = slide.tile_count(config.level) else {
        error!(
            "Level {} does not exist (slide has {})",
            config.level,
            slide.level_count()
        );
        return ExitCode::FAILURE;
    };

    let total = u64::from(tiles_x) * u64::from(tiles_y);
    let hits = AtomicU64::new(0);
    let misses = AtomicU64::new(0);
    let failures = AtomicU64::new(0);
    let started = Instant::now();

    info!(
        "Scanning level {} ({} tiles) with {} thread(s), {} pass(es)",
        config.level, total, config.threads, config.passes
    );

    for _ in 0..config.passes {
        std::thread::scope(|s| {
            for worker in 0..config.threads as u64 {
                let (slide, hits, misses, failures) = (&slide, &hits, &misses, &failures);
                let stride = config.threads as u64;
                s.spawn(move || {
                    let mut index = worker;
                    while index < total {
                        let col = (index % u64::from(tiles_x)) as u32;
                        let row = (index / u64::from(tiles_x)) as u32;
                        match slide.read_tile(config.level, col, row) {
                            Ok(tile) if tile.cache_hit() => hits.fetch_add(1, Ordering::Relaxed),
                            Ok(_) => misses.fetch_add(1, Ordering::Relaxed),
                            Err(e) => {
                                warn!("Tile ({}, {}): {}", col, row, e);
                                failures.fetch_add(1, Ordering::Relaxed)
                            }
                        };
                        index += stride;
                    }
                });
            }
        });
    }

    let cache = slide.cache();
    let failures = failures.into_inner();
    println!("Scanned {} tile reads in {:.2?}", total * config.passes as u64, started.elapsed());
    println!("  Hits:     {}", hits.into_inner());
    println!("  Misses:   {}", misses.into_inner());
    println!("  Failures: {}", failures);
    println!(
        "  Cache:    {} tiles, {} / {} bytes",
        cache.len(),
        cache.size(),
        cache.capacity()
    );

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
