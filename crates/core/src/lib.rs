//! Domain types for the plot-builder report service.
//!
//! Pure data and validation only: no I/O, no async. The pipeline and API
//! crates build on these.

pub mod dataset;
pub mod error;
pub mod job;
pub mod status;
pub mod types;
