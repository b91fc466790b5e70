//! Build context: the collaborator an aggregation run talks to.
//!
//! An aggregation never touches the surrounding build directly. It asks its
//! context for output streams, whether the run is incremental, whether any of
//! its inputs changed, and tells it when a file was deleted. Two contexts are
//! provided: [`FsContext`] for plain full builds and [`IncrementalContext`]
//! which remembers consumed sources in a [`BuildManifest`].

use crate::build::{BuildManifest, ManifestError};
use crate::config::AggregationConfig;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Services an aggregation run needs from the surrounding build.
pub trait BuildContext {
    /// Open `path` for writing, truncating any existing content.
    fn new_output(&mut self, path: &Path) -> io::Result<Box<dyn Write>>;

    /// Whether this run may skip work when nothing changed.
    fn is_incremental(&self) -> bool;

    /// Whether the aggregation described by `config` would produce something
    /// different from `files` than it did last run.
    fn has_delta(&self, config: &AggregationConfig, files: &[PathBuf]) -> bool;

    /// Notification that `path` changed on disk (e.g. was deleted).
    fn refresh(&mut self, path: &Path);

    /// Notification that `files` were aggregated into `config.output`.
    fn record_included(&mut self, _config: &AggregationConfig, _files: &[PathBuf]) {}
}

/// Full-build context writing straight to the filesystem.
#[derive(Debug, Default)]
pub struct FsContext {
    refreshed: Vec<PathBuf>,
}

impl FsContext {
    /// Create a new filesystem context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths reported through [`BuildContext::refresh`], in order.
    pub fn refreshed(&self) -> &[PathBuf] {
        &self.refreshed
    }
}

impl BuildContext for FsContext {
    fn new_output(&mut self, path: &Path) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(File::create(path)?))
    }

    fn is_incremental(&self) -> bool {
        false
    }

    fn has_delta(&self, _config: &AggregationConfig, _files: &[PathBuf]) -> bool {
        true
    }

    fn refresh(&mut self, path: &Path) {
        self.refreshed.push(path.to_path_buf());
    }
}

/// Manifest-backed context that skips aggregations with unchanged inputs.
///
/// The run is incremental when a manifest already existed on disk and force
/// mode is off. Call [`IncrementalContext::save`] after the build to persist
/// what was consumed.
#[derive(Debug)]
pub struct IncrementalContext {
    manifest_path: PathBuf,
    manifest: BuildManifest,
    had_manifest: bool,
    force: bool,
    inner: FsContext,
}

impl IncrementalContext {
    /// Load the manifest at `manifest_path`, starting fresh if it is absent.
    pub fn load(manifest_path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let manifest_path = manifest_path.into();
        let loaded = BuildManifest::load(&manifest_path)?;
        let had_manifest = loaded.is_some();
        Ok(Self {
            manifest_path,
            manifest: loaded.unwrap_or_default(),
            had_manifest,
            force: false,
            inner: FsContext::new(),
        })
    }

    /// Like [`IncrementalContext::load`], but an unreadable or incompatible
    /// manifest is discarded instead of failing.
    pub fn load_or_fresh(manifest_path: impl Into<PathBuf>) -> Self {
        let manifest_path = manifest_path.into();
        match Self::load(manifest_path.clone()) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(
                    path = %manifest_path.display(),
                    error = %e,
                    "Ignoring unusable manifest, doing a full build"
                );
                Self {
                    manifest_path,
                    manifest: BuildManifest::new(),
                    had_manifest: false,
                    force: false,
                    inner: FsContext::new(),
                }
            }
        }
    }

    /// Set force mode (every aggregation runs regardless of the manifest).
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Get a reference to the manifest.
    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// Where the manifest is persisted.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Paths reported through [`BuildContext::refresh`], in order.
    pub fn refreshed(&self) -> &[PathBuf] {
        self.inner.refreshed()
    }

    /// Persist the manifest; later runs become incremental.
    pub fn save(&mut self) -> Result<(), ManifestError> {
        self.manifest.save(&self.manifest_path)?;
        self.had_manifest = true;
        Ok(())
    }
}

impl BuildContext for IncrementalContext {
    fn new_output(&mut self, path: &Path) -> io::Result<Box<dyn Write>> {
        self.inner.new_output(path)
    }

    fn is_incremental(&self) -> bool {
        self.had_manifest && !self.force
    }

    fn has_delta(&self, config: &AggregationConfig, files: &[PathBuf]) -> bool {
        match self.manifest.needs_rebuild(config, files) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::warn!(error = %e, "Could not check manifest, assuming inputs changed");
                true
            }
        }
    }

    fn refresh(&mut self, path: &Path) {
        self.inner.refresh(path);
    }

    fn record_included(&mut self, config: &AggregationConfig, files: &[PathBuf]) {
        if let Err(e) = self.manifest.record_output(config, files) {
            tracing::warn!(
                output = %config.output.display(),
                error = %e,
                "Could not record aggregation in manifest"
            );
        }
    }
}
