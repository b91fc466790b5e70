//! Build manifest for tracking consumed sources between runs.
//!
//! The manifest keeps one entry per aggregation output: a fingerprint of the
//! aggregation settings it was built with and a content hash for every
//! source that went into it. The incremental build context uses it to decide
//! whether an aggregation has anything new to do.
//!
//! # Manifest Format
//!
//! The manifest is stored as JSON, by default in `.amdcat-manifest.json` at
//! the project root:
//!
//! ```json
//! {
//!   "version": 2,
//!   "created_at": "2024-01-15T10:30:00Z",
//!   "updated_at": "2024-01-15T10:35:00Z",
//!   "outputs": {
//!     "/project/build/app.js": {
//!       "settings": "5d3f0c6a1b2e9f47",
//!       "sources": {
//!         "/project/src/a.js": "cbf29ce484222325",
//!         "/project/src/b.js": "af63bd4c8601b7df"
//!       },
//!       "built_at": "2024-01-15T10:35:00Z"
//!     }
//!   }
//! }
//! ```

use crate::config::AggregationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Current manifest format version.
const MANIFEST_VERSION: u32 = 2;

/// Error during manifest operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Version mismatch
    #[error("Manifest version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Record of one written output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// Fingerprint of the aggregation settings used for the build
    pub settings: String,
    /// Source path to content hash, for every source concatenated into the output
    pub sources: BTreeMap<String, String>,
    /// When the output was written
    pub built_at: String,
}

/// Manifest of produced outputs and the sources they were built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Manifest format version
    pub version: u32,
    /// When the manifest was first created
    pub created_at: String,
    /// When the manifest was last updated
    pub updated_at: String,
    /// Output path to its build record
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputEntry>,
}

impl Default for BuildManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildManifest {
    /// Create a new empty manifest.
    pub fn new() -> Self {
        let now = format_timestamp(SystemTime::now());
        Self { version: MANIFEST_VERSION, created_at: now.clone(), updated_at: now, outputs: BTreeMap::new() }
    }

    /// Load a manifest from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let manifest: BuildManifest = serde_json::from_reader(reader)?;

        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::VersionMismatch {
                expected: MANIFEST_VERSION,
                found: manifest.version,
            });
        }

        Ok(Some(manifest))
    }

    /// Save the manifest to a file.
    pub fn save(&mut self, path: &Path) -> Result<(), ManifestError> {
        self.updated_at = format_timestamp(SystemTime::now());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;

        Ok(())
    }

    /// Record that `sources` were aggregated into `config.output`.
    ///
    /// Replaces any earlier entry for the output. Sources that no longer
    /// exist (e.g. removed after inclusion) are left out.
    pub fn record_output(
        &mut self,
        config: &AggregationConfig,
        sources: &[PathBuf],
    ) -> Result<(), ManifestError> {
        let mut hashes = BTreeMap::new();
        for source in sources {
            if source.exists() {
                hashes.insert(path_key(source), hash_file(source)?);
            }
        }

        self.outputs.insert(
            path_key(&config.output),
            OutputEntry {
                settings: settings_fingerprint(config)?,
                sources: hashes,
                built_at: format_timestamp(SystemTime::now()),
            },
        );
        Ok(())
    }

    /// Check whether `config.output` must be rebuilt from `sources`.
    ///
    /// A rebuild is needed if:
    /// - The output has never been recorded, or is missing on disk
    /// - The aggregation settings changed
    /// - The set of sources differs from the recorded one
    /// - Any source's content changed
    pub fn needs_rebuild(
        &self,
        config: &AggregationConfig,
        sources: &[PathBuf],
    ) -> Result<bool, ManifestError> {
        let Some(entry) = self.outputs.get(&path_key(&config.output)) else {
            return Ok(true);
        };

        if !config.output.exists() {
            return Ok(true);
        }
        if entry.settings != settings_fingerprint(config)? {
            return Ok(true);
        }
        if sources.len() != entry.sources.len() {
            return Ok(true);
        }

        for source in sources {
            match entry.sources.get(&path_key(source)) {
                None => return Ok(true),
                Some(old_hash) => {
                    if !source.exists() || hash_file(source)? != *old_hash {
                        return Ok(true);
                    }
                }
            }
        }

        Ok(false)
    }

    /// Get the entry recorded for an output.
    pub fn get_output(&self, output: &Path) -> Option<&OutputEntry> {
        self.outputs.get(&path_key(output))
    }

    /// Number of tracked outputs.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Check if no output is tracked.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Forget every recorded output.
    pub fn clear(&mut self) {
        self.outputs.clear();
    }
}

/// Hash of everything in an aggregation's settings that shapes its output.
fn settings_fingerprint(config: &AggregationConfig) -> Result<String, ManifestError> {
    let serialized = serde_json::to_vec(config)?;
    Ok(format!("{:016x}", fnv1a_update(FNV_OFFSET, &serialized)))
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Compute a content hash for a file.
fn hash_file(path: &Path) -> Result<String, ManifestError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hash = FNV_OFFSET;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hash = fnv1a_update(hash, &buf[..n]);
    }
    Ok(format!("{:016x}", hash))
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a over a chunk, continuing from `hash`.
fn fnv1a_update(mut hash: u64, data: &[u8]) -> u64 {
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Format a SystemTime as an ISO 8601 timestamp string.
fn format_timestamp(time: SystemTime) -> String {
    let duration = time.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = duration.as_secs();

    let days = secs / 86400;
    let remaining = secs % 86400;
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;

    let (year, month, day) = days_to_ymd(days as i64);

    format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z", year, month, day, hours, minutes, seconds)
}

/// Convert days since Unix epoch to year/month/day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    let mut remaining_days = days;
    let mut year = 1970i32;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months: [i64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1u32;
    for days_in_month in days_in_months {
        if remaining_days < days_in_month {
            break;
        }
        remaining_days -= days_in_month;
        month += 1;
    }

    (year, month, remaining_days as u32 + 1)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
