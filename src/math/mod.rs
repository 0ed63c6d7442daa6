//! Mathematical utilities: point-to-line geometry and the orthogonal-distance solver.

pub mod geometry;
pub mod odr;

pub use geometry::*;
pub use odr::*;
