//! Reporting utilities: terminal summary and fixed-column text records.

pub mod format;

pub use format::*;
