//! Fitting of the transformation equations.
//!
//! Responsibilities:
//!
//! - derive per-pair point sets from the catalog
//! - robust orthogonal line fit with sigma clipping on one point set
//! - drive every pair through its `Unfit → Fitting → Frozen` lifecycle

pub mod chain;
pub mod line_fit;
pub mod pointset;

pub use chain::*;
pub use line_fit::*;
pub use pointset::*;
