//! Input/output helpers.
//!
//! - column selection (`columns`)
//! - whitespace table ingest + header labels (`ingest`)
//! - output table, log file and figure paths (`export`)
//! - fit-summary JSON read/write (`fits`)

pub mod columns;
pub mod export;
pub mod fits;
pub mod ingest;

pub use columns::*;
pub use export::*;
pub use fits::*;
pub use ingest::*;
