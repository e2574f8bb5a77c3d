//! Configuration management for the `vsf-slide` command line tool.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `VSF_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use vsf_slide::config::Cli;
//!
//! // Parse from command line and environment
//! let cli = Cli::parse();
//! cli.validate()?;
//! ```
//!
//! # Environment Variables
//!
//! - `VSF_CACHE_SIZE` - Tile cache capacity in bytes (default: 32MB)
//! - `VSF_JSON` - Print `info` output as JSON (default: false)
//! - `VSF_QUALITY` - JPEG quality for exported tiles (default: 80)
//! - `VSF_THREADS` - Worker threads for `scan` (default: 4)
//! - `VSF_PASSES` - Passes over the level for `scan` (default: 2)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::tile::{is_valid_quality, DEFAULT_CACHE_CAPACITY, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of worker threads for `scan`.
pub const DEFAULT_SCAN_THREADS: usize = 4;

/// Default number of passes over a level for `scan`.
pub const DEFAULT_SCAN_PASSES: usize = 2;

// =============================================================================
// CLI Arguments
// =============================================================================

/// vsf-slide - Inspect and read tiles from VSF whole slide images.
#[derive(Parser, Debug, Clone)]
#[command(name = "vsf-slide")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tile cache capacity in bytes.
    #[arg(long, global = true, default_value_t = DEFAULT_CACHE_CAPACITY, env = "VSF_CACHE_SIZE")]
    pub cache_size: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check whether a path is a readable VSF container.
    Check(CheckConfig),

    /// Print header fields, levels and properties.
    Info(InfoConfig),

    /// Decode one tile and write it as PNG or JPEG.
    Tile(TileConfig),

    /// Read every tile of a level from several threads through one cache.
    Scan(ScanConfig),
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Path to the `.vsf` index file.
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Path to the `.vsf` index file.
    pub path: PathBuf,

    /// Print as JSON.
    #[arg(long, default_value_t = false, env = "VSF_JSON")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// Path to the `.vsf` index file.
    pub path: PathBuf,

    /// Pyramid level (0 = highest resolution).
    #[arg(long, default_value_t = 0)]
    pub level: usize,

    /// Tile column.
    #[arg(long)]
    pub col: u32,

    /// Tile row.
    #[arg(long)]
    pub row: u32,

    /// Output file; `.png`, `.jpg` or `.jpeg`.
    #[arg(short, long)]
    pub output: PathBuf,

    /// JPEG quality for `.jpg` output (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "VSF_QUALITY")]
    pub quality: u8,
}

#[derive(Args, Debug, Clone)]
pub struct ScanConfig {
    /// Path to the `.vsf` index file.
    pub path: PathBuf,

    /// Pyramid level to scan.
    #[arg(long, default_value_t = 0)]
    pub level: usize,

    /// Worker threads.
    #[arg(long, default_value_t = DEFAULT_SCAN_THREADS, env = "VSF_THREADS")]
    pub threads: usize,

    /// Passes over the level; passes after the first should hit the cache.
    #[arg(long, default_value_t = DEFAULT_SCAN_PASSES, env = "VSF_PASSES")]
    pub passes: usize,
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_size == 0 {
            return Err("cache_size must be greater than 0".to_string());
        }

        match &self.command {
            Command::Tile(config) if !is_valid_quality(config.quality) => {
                Err("quality must be between 1 and 100".to_string())
            }
            Command::Scan(config) if config.threads == 0 => {
                Err("threads must be greater than 0".to_string())
            }
            Command::Scan(config) if config.passes == 0 => {
                Err("passes must be greater than 0".to_string())
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
