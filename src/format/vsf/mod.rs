//! VSF container layout: index header, file naming and tile directories.

pub mod header;
pub mod locator;
pub mod naming;

pub use header::{read_index_file, IndexDescriptor, Version};
pub use locator::{locate, TileLocation, V1DirectoryLayout};
pub use naming::{check_index_extension, level_file_path, level_file_suffix};
