//! Equation plots: terminal preview (`ascii`) and SVG figures (`svg`).

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
