//! `std-photometry` library crate.
//!
//! Calibrates instrumental magnitudes onto a standard photometric system:
//! one color-term equation per band is fitted by weighted orthogonal-distance
//! regression with sigma clipping (or reviewed interactively), then applied
//! to every object of the catalog.
//!
//! The binary (`stdphot`) is a thin wrapper around this library so that
//! core logic is testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod plot;
pub mod report;
pub mod transform;
pub mod tui;
