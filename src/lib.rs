//! Reftest - visual regression harness for a document renderer
//!
//! This library extracts test cases from markup fixtures, drives an external
//! renderer to produce raster and vector artifacts, and compares rasters
//! against a baseline or golden image.

pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::{run, RunOptions, RunSummary};
