//! Tile cache behaviour observed through open slides.

use std::sync::Arc;
use std::thread;

use vsf_slide::tile::{PixelFormat, TileCache};
use vsf_slide::VsfSlide;

use super::test_utils::{build_v2_slide, tile_shade, V2SlideSpec};

/// Bytes of one decoded 16x16 RGBA tile.
const TILE_BYTES: u64 = 16 * 16 * 4;

fn png_slide() -> super::test_utils::TestSlide {
    build_v2_slide(&V2SlideSpec::new(64, 64, 16, 2, PixelFormat::Png))
}

// =============================================================================
// Hit / Miss Tests
// =============================================================================

#[test]
fn test_second_read_is_cache_hit() {
    let slide = png_slide();
    let vsf = VsfSlide::open(&slide.index).unwrap();

    let first = vsf.read_tile(0, 1, 2).unwrap();
    assert!(!first.cache_hit());

    let second = vsf.read_tile(0, 1, 2).unwrap();
    assert!(second.cache_hit());
    assert!(first.entry().ptr_eq(second.entry()));

    assert_eq!(vsf.cache().len(), 1);
    assert_eq!(vsf.cache().size(), TILE_BYTES);
}

#[test]
fn test_levels_do_not_share_cache_keys() {
    let slide = png_slide();
    let vsf = VsfSlide::open(&slide.index).unwrap();

    let level0 = vsf.read_tile(0, 0, 0).unwrap();
    let level1 = vsf.read_tile(1, 0, 0).unwrap();

    assert!(!level1.cache_hit());
    assert!(!level0.entry().ptr_eq(level1.entry()));
    assert_eq!(vsf.cache().len(), 2);
}

// =============================================================================
// Shared Cache Tests
// =============================================================================

#[test]
fn test_shared_cache_across_slides() {
    let a = png_slide();
    let b = png_slide();
    let cache = TileCache::shared(64 * TILE_BYTES);

    let slide_a = VsfSlide::open_with_cache(&a.index, Arc::clone(&cache)).unwrap();
    let slide_b = VsfSlide::open_with_cache(&b.index, Arc::clone(&cache)).unwrap();

    slide_a.read_tile(0, 0, 0).unwrap();
    // Same coordinates on another slide must not hit
    let tile_b = slide_b.read_tile(0, 0, 0).unwrap();
    assert!(!tile_b.cache_hit());

    assert_eq!(cache.len(), 2);
    assert!(Arc::ptr_eq(&slide_a.cache(), &slide_b.cache()));
}

#[test]
fn test_evicted_handle_stays_readable() {
    let slide = png_slide();
    let cache = TileCache::shared(2 * TILE_BYTES);
    let vsf = VsfSlide::open_with_cache(&slide.index, Arc::clone(&cache)).unwrap();

    let held = vsf.read_tile(0, 0, 0).unwrap();
    vsf.read_tile(0, 1, 0).unwrap();
    vsf.read_tile(0, 2, 0).unwrap();

    // (0, 0) was least recently used and is gone from the cache
    assert_eq!(cache.len(), 2);
    assert!(!vsf.read_tile(0, 0, 0).unwrap().cache_hit());

    let shade = tile_shade(0, 0, 0);
    let px = held.pixel(3, 3).unwrap();
    assert_eq!(px, [shade, shade / 2, 255 - shade, 255]);
    assert_eq!(held.entry().ref_count(), 1);
}

#[test]
fn test_lru_order_follows_reads() {
    let slide = png_slide();
    let cache = TileCache::shared(3 * TILE_BYTES);
    let vsf = VsfSlide::open_with_cache(&slide.index, Arc::clone(&cache)).unwrap();

    vsf.read_tile(0, 0, 0).unwrap();
    vsf.read_tile(0, 1, 0).unwrap();
    vsf.read_tile(0, 2, 0).unwrap();
    // Touch (0, 0) so (1, 0) becomes the eviction candidate
    assert!(vsf.read_tile(0, 0, 0).unwrap().cache_hit());
    vsf.read_tile(0, 3, 0).unwrap();

    assert!(vsf.read_tile(0, 0, 0).unwrap().cache_hit());
    assert!(vsf.read_tile(0, 2, 0).unwrap().cache_hit());
    assert!(!vsf.read_tile(0, 1, 0).unwrap().cache_hit());
}

#[test]
fn test_set_cache_switches_future_reads() {
    let slide = png_slide();
    let vsf = VsfSlide::open(&slide.index).unwrap();

    let old = vsf.read_tile(0, 0, 0).unwrap();
    let private = vsf.cache();
    assert_eq!(private.len(), 1);

    let replacement = TileCache::shared(16 * TILE_BYTES);
    vsf.set_cache(Arc::clone(&replacement));

    let new = vsf.read_tile(0, 0, 0).unwrap();
    assert!(!new.cache_hit());
    assert_eq!(replacement.len(), 1);
    assert!(!old.entry().ptr_eq(new.entry()));

    // The old cache is still alive through our handle and keeps its entry
    assert_eq!(private.len(), 1);
    drop(old);
}

#[test]
fn test_oversize_tile_never_cached() {
    let slide = png_slide();
    let cache = TileCache::shared(TILE_BYTES - 1);
    let vsf = VsfSlide::open_with_cache(&slide.index, Arc::clone(&cache)).unwrap();

    for _ in 0..3 {
        let tile = vsf.read_tile(0, 0, 0).unwrap();
        assert!(!tile.cache_hit());
        assert_eq!(tile.width(), 16);
    }
    assert!(cache.is_empty());
    assert_eq!(cache.size(), 0);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_reads_with_small_cache() {
    let slide = png_slide();
    let cache = TileCache::shared(5 * TILE_BYTES);
    let vsf = VsfSlide::open_with_cache(&slide.index, Arc::clone(&cache)).unwrap();

    thread::scope(|s| {
        for t in 0..4u32 {
            let vsf = &vsf;
            s.spawn(move || {
                for pass in 0..3u32 {
                    for i in 0..16u32 {
                        let (col, row) = ((i + t + pass) % 4, i / 4);
                        let tile = vsf.read_tile(0, col, row).unwrap();
                        let shade = tile_shade(0, col, row);
                        assert_eq!(tile.pixel(0, 0).unwrap()[0], shade);
                    }
                }
            });
        }
    });

    assert!(cache.len() <= 5);
    assert!(cache.size() <= cache.capacity());
}

#[test]
fn test_concurrent_set_cache_during_reads() {
    let slide = png_slide();
    let vsf = VsfSlide::open(&slide.index).unwrap();

    thread::scope(|s| {
        let vsf = &vsf;
        s.spawn(move || {
            for _ in 0..20 {
                vsf.set_cache(TileCache::shared(8 * TILE_BYTES));
            }
        });
        for _ in 0..2 {
            s.spawn(move || {
                for i in 0..32u32 {
                    let tile = vsf.read_tile(0, i % 4, (i / 4) % 4).unwrap();
                    assert_eq!(tile.height(), 16);
                }
            });
        }
    });
}
