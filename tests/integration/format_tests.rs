//! Index parsing, container detection and tile location tests.

use bytes::Bytes;

use vsf_slide::error::{FormatError, TileError};
use vsf_slide::format::vsf::{
    level_file_path, locate, read_index_file, IndexDescriptor, TileLocation, V1DirectoryLayout,
    Version,
};
use vsf_slide::format::{check, detect, required_focal_planes};
use vsf_slide::tile::PixelFormat;
use vsf_slide::VsfSlide;

use super::test_utils::{
    build_v1_slide, build_v2_slide, remove, v1_index, v1_level_file, v2_level_file,
    TrackingReader, V2Header, V2SlideSpec,
};

const V2: Version = Version { major: 2, minor: 1 };

// =============================================================================
// Index Header Tests
// =============================================================================

#[test]
fn test_v2_1_header_from_file() {
    let mut header = V2Header::new(40_000, 30_000, 512, 7);
    header.background = [240, 230, 220];
    header.resolution_x = 100_000;
    header.resolution_y = 50_000;
    header.format_tag = PixelFormat::Png.tag();
    header.quality = 90;
    header.lowest_focal_plane = -2;
    header.highest_focal_plane = 3;
    header.z_range = 2.5;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.vsf");
    std::fs::write(&path, header.to_bytes()).unwrap();

    let desc = read_index_file(&path).unwrap();
    assert_eq!(desc.version, Version { major: 2, minor: 1 });
    assert_eq!(desc.header_text, "VSF2.1 test scanner");
    assert_eq!(desc.level_count, 7);
    assert_eq!(desc.background, [240, 230, 220]);
    assert_eq!((desc.width, desc.height), (40_000, 30_000));
    assert_eq!((desc.tile_width, desc.tile_height), (512, 512));
    assert_eq!((desc.resolution_x, desc.resolution_y), (100_000, 50_000));
    assert_eq!(desc.format_tag, 2);
    assert_eq!(desc.quality, 90);
    assert_eq!(desc.focal_planes(), -2..=3);
    assert_eq!(desc.z_range, 2.5);
}

#[test]
fn test_v2_0_header_keeps_focal_defaults() {
    let mut header = V2Header::new(1000, 800, 256, 4);
    header.minor = 0;
    header.text = "VSF2.0".to_string();
    header.lowest_focal_plane = -5;
    header.highest_focal_plane = 5;

    let raw = header.to_bytes();
    assert_eq!(raw.len(), 60);

    let desc = IndexDescriptor::parse(&Bytes::from(raw)).unwrap();
    assert_eq!(desc.version, Version { major: 2, minor: 0 });
    assert_eq!(desc.level_count, 4);
    assert_eq!(desc.focal_planes(), 0..=0);
    assert_eq!(desc.z_range, 0.0);
}

#[test]
fn test_v2_1_header_truncated() {
    let mut raw = V2Header::new(1000, 800, 256, 4).to_bytes();
    raw.truncate(64);

    let result = IndexDescriptor::parse(&Bytes::from(raw));
    assert!(matches!(result, Err(FormatError::Io(_))));
}

#[test]
fn test_v1_headers_all_minors() {
    for minor in 0..=2u8 {
        let raw = v1_index(minor, 3000, 2000, 240, 240);
        let desc = IndexDescriptor::parse(&Bytes::from(raw)).unwrap();

        assert_eq!(desc.version, Version { major: 1, minor });
        assert_eq!((desc.width, desc.height), (3000, 2000));
        assert_eq!((desc.tile_width, desc.tile_height), (240, 240));
        // Fields version 1 does not carry keep their defaults
        assert_eq!(desc.level_count, 9);
        assert_eq!(desc.background, [255, 255, 255]);
        assert_eq!(desc.format_tag, 0);
        assert_eq!(desc.focal_planes(), 0..=0);
    }
}

#[test]
fn test_unsupported_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.vsf");
    std::fs::write(&path, b"ABCDEFGHIJKLMNOPQRSTUVWXYZ").unwrap();

    assert!(matches!(
        read_index_file(&path),
        Err(FormatError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_missing_index_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_index_file(dir.path().join("absent.vsf"));
    assert!(matches!(result, Err(FormatError::Io(_))));
}

#[test]
fn test_wrong_extension_rejected_before_reading() {
    // The file does not exist; the extension check must fail first
    let result = read_index_file("/nonexistent/slide.tif");
    assert!(matches!(result, Err(FormatError::InvalidExtension(_))));
}

// =============================================================================
// Detection Tests
// =============================================================================

#[test]
fn test_detect_complete_v2_container() {
    let spec = V2SlideSpec::new(64, 48, 16, 3, PixelFormat::Png);
    let slide = build_v2_slide(&spec);

    assert!(detect(&slide.index));
    let desc = check(&slide.index).unwrap();
    assert_eq!(desc.level_count, 3);
}

#[test]
fn test_detect_uppercase_extension() {
    let spec = V2SlideSpec::new(32, 32, 16, 1, PixelFormat::Png);
    let slide = build_v2_slide(&spec);

    let upper = slide.level_path("SLIDE.VSF");
    std::fs::rename(&slide.index, &upper).unwrap();
    std::fs::rename(
        slide.level_path("slide-level00.img"),
        slide.level_path("SLIDE-level00.img"),
    )
    .unwrap();

    assert!(detect(&upper));
}

#[test]
fn test_detect_missing_level_file() {
    let spec = V2SlideSpec::new(64, 48, 16, 3, PixelFormat::Png);
    let slide = build_v2_slide(&spec);
    remove(&slide, "slide-level02.img");

    assert!(!detect(&slide.index));
    match check(&slide.index) {
        Err(FormatError::MissingFile { path }) => assert!(path.ends_with("slide-level02.img")),
        other => panic!("expected MissingFile, got {:?}", other),
    }
}

#[test]
fn test_detect_missing_focal_plane_file() {
    let mut spec = V2SlideSpec::new(32, 32, 16, 2, PixelFormat::Png);
    spec.header.lowest_focal_plane = -1;
    spec.header.highest_focal_plane = 1;
    let slide = build_v2_slide(&spec);

    assert!(slide.level_path("slide-level01-1.img").exists());
    assert!(slide.level_path("slide-level01+1.img").exists());
    assert!(detect(&slide.index));

    remove(&slide, "slide-level01+1.img");
    assert!(!detect(&slide.index));
}

#[test]
fn test_detect_requires_plane_zero_outside_range() {
    let mut spec = V2SlideSpec::new(32, 32, 16, 1, PixelFormat::Png);
    spec.header.lowest_focal_plane = 2;
    spec.header.highest_focal_plane = 3;
    let slide = build_v2_slide(&spec);

    let desc = check(&slide.index).unwrap();
    assert_eq!(required_focal_planes(&desc).collect::<Vec<_>>(), vec![2, 3, 0]);

    remove(&slide, "slide-level00.img");
    assert!(!detect(&slide.index));
}

#[test]
fn test_detect_rejects_unbounded_focal_range() {
    let mut header = V2Header::new(64, 64, 16, 1);
    header.lowest_focal_plane = i32::MIN;
    header.highest_focal_plane = i32::MAX;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slide.vsf");
    std::fs::write(&path, header.to_bytes()).unwrap();
    std::fs::write(dir.path().join("slide-level00.img"), v2_level_file(&[])).unwrap();

    assert!(!detect(&path));
    assert!(matches!(
        check(&path),
        Err(FormatError::MalformedHeader { .. })
    ));
    assert!(matches!(
        VsfSlide::open(&path),
        Err(FormatError::MalformedHeader { .. })
    ));
}

#[test]
fn test_detect_rejects_inverted_focal_range() {
    let mut header = V2Header::new(64, 64, 16, 1);
    header.lowest_focal_plane = 3;
    header.highest_focal_plane = -3;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slide.vsf");
    std::fs::write(&path, header.to_bytes()).unwrap();

    assert!(matches!(
        check(&path),
        Err(FormatError::MalformedHeader { .. })
    ));
}

#[test]
fn test_detect_v1_container() {
    let slide = build_v1_slide(1, 64, 64, 32, 0);
    assert!(detect(&slide.index));

    remove(&slide, "slide-level8.img");
    assert!(matches!(
        check(&slide.index),
        Err(FormatError::MissingFile { .. })
    ));
}

#[test]
fn test_detect_non_vsf_paths() {
    let dir = tempfile::tempdir().unwrap();
    let tiff = dir.path().join("slide.tif");
    std::fs::write(&tiff, b"II*\0").unwrap();

    assert!(!detect(&tiff));
    assert!(!detect(dir.path().join("missing.vsf")));
}

#[test]
fn test_level_file_naming_matches_builder() {
    let spec = V2SlideSpec::new(64, 64, 16, 2, PixelFormat::Png);
    let slide = build_v2_slide(&spec);

    let path = level_file_path(&slide.index, V2, 1, 0).unwrap();
    assert_eq!(path, slide.level_path("slide-level01.img"));
    assert!(path.exists());
}

// =============================================================================
// Tile Location Tests
// =============================================================================

#[test]
fn test_locate_v2_reads_consecutive_offsets() {
    let payloads = vec![vec![1u8; 10], vec![2u8; 25], vec![3u8; 7]];
    let reader = TrackingReader::new(v2_level_file(&payloads));

    let first = locate(&reader, V2, 0, 0).unwrap();
    assert_eq!(first, TileLocation { offset: 40, size: 10 });

    let second = locate(&reader, V2, 0, 1).unwrap();
    assert_eq!(second, TileLocation { offset: 50, size: 25 });
}

#[test]
fn test_locate_v2_last_tile_extends_to_end_of_file() {
    let payloads = vec![vec![1u8; 10], vec![2u8; 25], vec![3u8; 7]];
    let reader = TrackingReader::new(v2_level_file(&payloads));

    let last = locate(&reader, V2, 0, 2).unwrap();
    assert_eq!(last, TileLocation { offset: 75, size: 7 });

    // The directory is read, the payload is not
    assert!(reader.furthest_read() <= 40);
}

#[test]
fn test_locate_v2_index_out_of_range_reads_only_count() {
    let payloads = vec![vec![1u8; 10], vec![2u8; 25]];
    let reader = TrackingReader::new(v2_level_file(&payloads));

    let result = locate(&reader, V2, 0, 2);
    assert!(matches!(
        result,
        Err(TileError::InvalidTileIndex { index: 2, count: 2 })
    ));
    assert_eq!(reader.requests(), vec![(8, 8)]);
}

#[test]
fn test_locate_v2_empty_tile() {
    let payloads = vec![vec![1u8; 10], Vec::new(), vec![3u8; 4]];
    let reader = TrackingReader::new(v2_level_file(&payloads));

    let empty = locate(&reader, V2, 0, 1).unwrap();
    assert_eq!(empty.size, 0);
}

#[test]
fn test_locate_v2_decreasing_offsets_are_corrupt() {
    let mut file = v2_level_file(&[vec![1u8; 10], vec![2u8; 10]]);
    // Point tile 1 before tile 0
    file[24..32].copy_from_slice(&4u64.to_le_bytes());
    let reader = TrackingReader::new(file);

    assert!(matches!(
        locate(&reader, V2, 0, 0),
        Err(TileError::CorruptDirectory { .. })
    ));
}

#[test]
fn test_locate_v1_skips_earlier_levels() {
    for minor in 0..=2u8 {
        let version = Version { major: 1, minor };
        let layout = V1DirectoryLayout::for_minor(minor).unwrap();
        let offsets = [100u64, 200, 300, 400, 500, 600];
        let reader = TrackingReader::new(v1_level_file(minor, 3, 2, 3, &offsets));

        let location = locate(&reader, version, 2, 4).unwrap();
        assert_eq!(location.offset, 500);
        // Size comes from the high word of the offset, not the stored field
        assert_eq!(location.size, 0);

        let expected = layout.record_position(6, 2, 4).unwrap();
        let requests = reader.requests();
        let last = requests.last().unwrap();
        assert_eq!(last.0, expected);
        assert_eq!(last.1, layout.offset_size + 4);
    }
}

#[test]
fn test_locate_v1_size_from_offset_high_word() {
    let offset = (3u64 << 32) | 0x10;
    let reader = TrackingReader::new(v1_level_file(1, 1, 1, 1, &[offset]));

    let location = locate(&reader, Version { major: 1, minor: 1 }, 0, 0).unwrap();
    assert_eq!(location.offset, offset);
    assert_eq!(location.size, 3);
}

#[test]
fn test_locate_v1_index_beyond_grid() {
    let reader = TrackingReader::new(v1_level_file(2, 2, 2, 1, &[1, 2, 3, 4]));

    let result = locate(&reader, Version { major: 1, minor: 2 }, 0, 4);
    assert!(matches!(
        result,
        Err(TileError::InvalidTileIndex { index: 4, count: 4 })
    ));
}

#[test]
fn test_locate_v1_truncated_directory() {
    let mut file = v1_level_file(0, 4, 4, 1, &[]);
    file.truncate(60);
    let reader = TrackingReader::new(file);

    let result = locate(&reader, Version { major: 1, minor: 0 }, 0, 15);
    assert!(matches!(result, Err(TileError::Io(_))));
}
