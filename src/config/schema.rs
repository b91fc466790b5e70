//! Configuration schema types for `amdcat.toml`
//!
//! Defines the structure and validation rules for amdcat project configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default manifest filename, relative to the project root.
pub const DEFAULT_MANIFEST: &str = ".amdcat-manifest.json";

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
}

/// Build behaviour shared by every aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Skip aggregations whose inputs did not change since the last build
    #[serde(default = "default_true")]
    pub incremental: bool,
    /// Manifest file used for change detection
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    /// Tolerate dependency cycles instead of failing the build
    #[serde(default)]
    pub allow_cycles: bool,
    /// Continue with later aggregations after one fails
    #[serde(default)]
    pub keep_going: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            incremental: true,
            manifest: default_manifest(),
            allow_cycles: false,
            keep_going: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_manifest() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST)
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear the terminal before each rebuild
    #[serde(default)]
    pub clear_screen: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

fn default_debounce_ms() -> u32 {
    100
}

/// One `[[aggregation]]` entry: a set of inputs concatenated into one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Output file
    pub output: PathBuf,
    /// Base directory for include patterns (defaults to the output's parent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
    /// Include entries, literal paths or glob patterns, in emission order
    #[serde(default)]
    pub includes: Vec<String>,
    /// Exclude patterns applied to glob expansion
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Delete each source file once it has been copied
    #[serde(default)]
    pub remove_included: bool,
    /// Append a newline after each file (and after each header)
    #[serde(default)]
    pub insert_new_line: bool,
    /// Prefix each file with a `/*name*/` comment
    #[serde(default)]
    pub insert_file_header: bool,
    /// Append a `;` after each file
    #[serde(default)]
    pub fix_last_semicolon: bool,
    /// Skip glob matches already consumed by an earlier aggregation
    #[serde(default)]
    pub auto_exclude_wildcards: bool,
    /// Reorder files so module dependencies come first
    #[serde(default)]
    pub module_ordering: bool,
}

impl AggregationConfig {
    /// Create an aggregation writing to `output` with no includes and all flags off.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            input_dir: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            remove_included: false,
            insert_new_line: false,
            insert_file_header: false,
            fix_last_semicolon: false,
            auto_exclude_wildcards: false,
            module_ordering: false,
        }
    }

    /// Set the input directory.
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(dir.into());
        self
    }

    /// Append an include entry.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    /// Append an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Set remove-included mode.
    pub fn with_remove_included(mut self, value: bool) -> Self {
        self.remove_included = value;
        self
    }

    /// Set insert-new-line mode.
    pub fn with_new_line(mut self, value: bool) -> Self {
        self.insert_new_line = value;
        self
    }

    /// Set insert-file-header mode.
    pub fn with_file_header(mut self, value: bool) -> Self {
        self.insert_file_header = value;
        self
    }

    /// Set fix-last-semicolon mode.
    pub fn with_fix_semicolon(mut self, value: bool) -> Self {
        self.fix_last_semicolon = value;
        self
    }

    /// Set auto-exclude-wildcards mode.
    pub fn with_auto_exclude(mut self, value: bool) -> Self {
        self.auto_exclude_wildcards = value;
        self
    }

    /// Set module-ordering mode.
    pub fn with_module_ordering(mut self, value: bool) -> Self {
        self.module_ordering = value;
        self
    }

    /// Return a copy with relative `output` and `input_dir` joined onto `root`.
    pub fn resolved_against(&self, root: &Path) -> Self {
        let mut resolved = self.clone();
        resolved.output = resolve(root, &self.output);
        resolved.input_dir = self.input_dir.as_deref().map(|dir| resolve(root, dir));
        resolved
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Complete amdcat configuration (root of `amdcat.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmdcatConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Build behaviour
    #[serde(default)]
    pub build: BuildConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Aggregations, run in declaration order
    #[serde(default, rename = "aggregation")]
    pub aggregations: Vec<AggregationConfig>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "aggregation[0].includes")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "amdcat.toml: '{}' {}", self.field, self.message)
    }
}

impl AmdcatConfig {
    /// Validate the configuration and return all errors found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if self.aggregations.is_empty() {
            errors.push(ConfigValidationError {
                field: "aggregation".to_string(),
                message: "must define at least one aggregation".to_string(),
            });
        }

        let mut outputs = HashSet::new();
        for (index, aggregation) in self.aggregations.iter().enumerate() {
            if aggregation.output.as_os_str().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("aggregation[{}].output", index),
                    message: "must be a non-empty path".to_string(),
                });
            } else if !outputs.insert(aggregation.output.clone()) {
                errors.push(ConfigValidationError {
                    field: format!("aggregation[{}].output", index),
                    message: format!(
                        "'{}' is already written by another aggregation",
                        aggregation.output.display()
                    ),
                });
            }

            if aggregation.includes.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("aggregation[{}].includes", index),
                    message: "must contain at least one entry".to_string(),
                });
            }
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }
}
