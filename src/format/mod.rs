//! Container parsing for VSF whole slide images.
//!
//! A VSF slide is a small index file (`*.vsf`) plus one data file per pyramid
//! level and focal plane. This module parses the index, names the data files,
//! and finds tiles inside them.
//!
//! # Detection
//!
//! Use [`detect::detect`] to probe a path, or [`detect::check`] to learn why a
//! path was rejected.

pub mod detect;
pub mod vsf;

pub use detect::{check, detect, required_focal_planes};
