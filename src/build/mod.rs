//! Aggregation build system for amdcat
//!
//! Concatenates groups of source files into single output files, optionally
//! reordering AMD-style modules so that dependencies come first.
//!
//! # Overview
//!
//! One aggregation goes through:
//! - **Discovery**: resolve include patterns against the input directory
//! - **Ordering**: read each file's `define(...)` line and sort dependencies first
//! - **Aggregation**: stream the files into the output with optional decorations
//!
//! # Example
//!
//! ```ignore
//! use amdcat::build::{BuildPipeline, FsContext};
//! use amdcat::config::load_config;
//!
//! let (config, path) = load_config(None)?;
//! let pipeline = BuildPipeline::new(&config, path.parent().unwrap());
//!
//! let result = pipeline.run(&mut FsContext::new());
//! println!("{}", result.summary());
//! ```

pub mod aggregate;
pub mod context;
pub mod discovery;
pub mod manifest;
pub mod module;
pub mod ordering;
pub mod pipeline;
pub mod result;

pub use aggregate::*;
pub use context::*;
pub use discovery::*;
pub use manifest::*;
pub use module::*;
pub use ordering::*;
pub use pipeline::*;
pub use result::*;
