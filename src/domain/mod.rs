//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - per-band measurements and the input catalog (`Band`, `Catalog`)
//! - run configuration (`CalibConfig`)
//! - fit outputs (`FitParams`, `CalibrationResult`, `StandardizedTable`)

pub mod types;

pub use types::*;
