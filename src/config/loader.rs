//! Configuration loading and discovery for `amdcat.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{AmdcatConfig, BuildConfig, ProjectConfig, WatchConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "amdcat.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No config file was found
    #[error("No amdcat.toml found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse amdcat.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Disable incremental builds
    pub incremental: Option<bool>,
    /// Tolerate dependency cycles
    pub allow_cycles: Option<bool>,
    /// Continue after a failed aggregation
    pub keep_going: Option<bool>,
}

/// Find amdcat.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find amdcat.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an amdcat.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file.
///
/// Returns the configuration together with the path it was read from.
///
/// # Example
/// ```ignore
/// let (config, path) = load_config(None)?;
/// let root = project_root(&path).unwrap_or(Path::new("."));
/// ```
pub fn load_config(path: Option<&Path>) -> Result<(AmdcatConfig, PathBuf), ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => find_config().ok_or_else(|| {
            ConfigError::NotFound(env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        })?,
    };

    let config = load_config_file(&config_path)?;
    Ok((config, config_path))
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<AmdcatConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<AmdcatConfig, ConfigError> {
    let config: AmdcatConfig = toml::from_str(contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a configuration with no aggregations.
///
/// The project name is taken from the current directory. Used for ad-hoc runs
/// that describe their single aggregation on the command line.
pub fn default_config() -> AmdcatConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    AmdcatConfig {
        project: ProjectConfig { name: project_name },
        build: BuildConfig::default(),
        watch: WatchConfig::default(),
        aggregations: Vec::new(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut AmdcatConfig, overrides: &CliOverrides) {
    if let Some(incremental) = overrides.incremental {
        config.build.incremental = incremental;
    }
    if let Some(allow_cycles) = overrides.allow_cycles {
        config.build.allow_cycles = allow_cycles;
    }
    if let Some(keep_going) = overrides.keep_going {
        config.build.keep_going = keep_going;
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the amdcat.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}
