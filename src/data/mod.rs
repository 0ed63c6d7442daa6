//! Data sources other than files on disk.
//!
//! - `sample`: deterministic synthetic catalogs for demos and tests

pub mod sample;

pub use sample::*;
