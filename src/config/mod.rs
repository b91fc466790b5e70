//! Configuration module for amdcat
//!
//! Provides types and parsing for `amdcat.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, load_config, merge_cli_overrides, ConfigError, CliOverrides,
};
pub use schema::*;
