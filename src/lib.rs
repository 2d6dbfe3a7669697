//! Offline inspection tools for ITCH market-data captures.
//!
//! This crate provides the core types and logic used by the `itch-parser`,
//! `book-visualizer` and `execution-visualizer` binaries:
//!
//! - `frame`: length-prefixed (`u16` big-endian) record framing
//! - `itch`: typed decoding of ITCH 5.0 message payloads
//! - `book`, `instruments`, `capture`: market state rebuilt from a capture and
//!   the per-stock text dumps derived from it
//! - `snapshot`, `buckets`, `replay`: snapshot log parsing, price-bucket
//!   histograms and their paced replay through a `Renderer`
//! - `execution`: execution price files
//! - `render`, `telemetry`: terminal/headless renderers and logging setup
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

pub mod book;
pub mod buckets;
pub mod capture;
pub mod error;
pub mod execution;
pub mod frame;
pub mod instruments;
pub mod itch;
pub mod render;
pub mod replay;
pub mod snapshot;
pub mod telemetry;

pub use error::{Error, Result};

/// Open an input file, reporting a missing path as [`Error::MissingFile`].
pub fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::MissingFile(path.to_path_buf()),
        _ => Error::Io(e),
    })
}
