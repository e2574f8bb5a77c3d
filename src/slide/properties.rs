//! Slide properties.
//!
//! Populated once when a slide is opened and read-only afterwards.
//!
//! | Key                           | Value                                   |
//! |-------------------------------|-----------------------------------------|
//! | `vsf.comment`                 | Header text                             |
//! | `vsf.filename`                | Index file path                         |
//! | `vsf.version`                 | `major.minor`                           |
//! | `vsf.mpp-x`, `vsf.mpp-y`      | 25400 / DPI (omitted if DPI is unknown) |
//! | `vsf.background-color`        | `RRGGBB`                                |
//! | `vsf.pixel-format`            | Tile compression                        |
//! | `vsf.quality`                 | Compression quality                     |
//! | `vsf.level-count`             | Number of pyramid levels                |
//! | `vsf.focal-plane-range`       | `lowest..highest`                       |
//! | `vsf.z-range`                 | Focal depth range in micrometres        |
//! | `vsf.level[N].*`              | Per-level geometry                      |

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::format::vsf::IndexDescriptor;
use crate::tile::PixelFormat;

use super::reader::Level;

pub const PROPERTY_COMMENT: &str = "vsf.comment";
pub const PROPERTY_FILENAME: &str = "vsf.filename";
pub const PROPERTY_VERSION: &str = "vsf.version";
pub const PROPERTY_MPP_X: &str = "vsf.mpp-x";
pub const PROPERTY_MPP_Y: &str = "vsf.mpp-y";
pub const PROPERTY_BACKGROUND_COLOR: &str = "vsf.background-color";
pub const PROPERTY_PIXEL_FORMAT: &str = "vsf.pixel-format";
pub const PROPERTY_QUALITY: &str = "vsf.quality";
pub const PROPERTY_LEVEL_COUNT: &str = "vsf.level-count";
pub const PROPERTY_FOCAL_PLANE_RANGE: &str = "vsf.focal-plane-range";
pub const PROPERTY_Z_RANGE: &str = "vsf.z-range";

/// Read-only string properties of an open slide, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    /// Collect the properties of a slide being opened.
    pub(crate) fn collect(descriptor: &IndexDescriptor, index_path: &Path, levels: &[Level]) -> Self {
        let mut props = Self::default();

        props.set(PROPERTY_COMMENT, descriptor.header_text.clone());
        props.set(PROPERTY_FILENAME, index_path.display().to_string());
        props.set(PROPERTY_VERSION, descriptor.version.to_string());

        if let Some(mpp) = IndexDescriptor::microns_per_pixel(descriptor.resolution_x) {
            props.set(PROPERTY_MPP_X, format_double(mpp));
        }
        if let Some(mpp) = IndexDescriptor::microns_per_pixel(descriptor.resolution_y) {
            props.set(PROPERTY_MPP_Y, format_double(mpp));
        }

        let [r, g, b] = descriptor.background;
        props.set(PROPERTY_BACKGROUND_COLOR, format!("{:02X}{:02X}{:02X}", r, g, b));

        let format = if descriptor.version.major == 1 {
            PixelFormat::Jpeg.name().to_string()
        } else {
            match PixelFormat::from_tag(descriptor.format_tag) {
                Ok(format) => format.name().to_string(),
                Err(_) => format!("unknown ({})", descriptor.format_tag),
            }
        };
        props.set(PROPERTY_PIXEL_FORMAT, format);
        props.set(PROPERTY_QUALITY, descriptor.quality.to_string());
        props.set(PROPERTY_LEVEL_COUNT, levels.len().to_string());
        props.set(
            PROPERTY_FOCAL_PLANE_RANGE,
            format!(
                "{}..{}",
                descriptor.lowest_focal_plane, descriptor.highest_focal_plane
            ),
        );
        props.set(PROPERTY_Z_RANGE, format_double(f64::from(descriptor.z_range)));

        for (i, level) in levels.iter().enumerate() {
            let (w, h) = level.dimensions();
            let (tw, th) = level.tile_size();
            props.set(&format!("vsf.level[{}].width", i), w.to_string());
            props.set(&format!("vsf.level[{}].height", i), h.to_string());
            props.set(&format!("vsf.level[{}].tile-width", i), tw.to_string());
            props.set(&format!("vsf.level[{}].tile-height", i), th.to_string());
            props.set(
                &format!("vsf.level[{}].downsample", i),
                format_double(level.downsample()),
            );
        }

        props
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.entry(key.to_string()).or_insert(value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shortest decimal form that parses back to the same value.
fn format_double(value: f64) -> String {
    format!("{}", value)
}
