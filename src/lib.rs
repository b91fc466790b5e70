//! amdcat - Library for aggregating source files into bundles
//!
//! This library provides functionality to:
//! - Resolve ordered include patterns against an input directory
//! - Order AMD `define(...)` modules so dependencies come first
//! - Concatenate the files into one output, optionally decorated
//! - Skip aggregations whose inputs did not change since the last build

pub mod build;
pub mod cli;
pub mod config;
pub mod watch;
