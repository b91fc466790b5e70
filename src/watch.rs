//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for the `amdcat build --watch` command.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::discovery::canonical_key;
use crate::build::{BuildResult, ProjectBuild};

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch '{}': {source}", path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    Channel(String),
    /// No aggregation has an existing input directory
    #[error("No input directory to watch")]
    NothingToWatch,
}

/// Tracks failing outputs across build iterations for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    failing: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with new build result, returns outputs that recovered
    pub fn update(&mut self, result: &BuildResult) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> =
            result.failures().into_iter().map(|r| r.output.clone()).collect();

        let mut fixed: Vec<PathBuf> = self.failing.difference(&current).cloned().collect();
        fixed.sort();

        self.failing = current;
        fixed
    }

    /// Check if there are any tracked failures
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of failing outputs
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Paths whose changes never trigger a rebuild: the build's own outputs and manifest.
#[derive(Debug, Default)]
pub struct IgnoreSet {
    paths: HashSet<PathBuf>,
}

impl IgnoreSet {
    /// Ignore set for a project build.
    pub fn for_build(build: &ProjectBuild) -> Self {
        let mut paths: HashSet<PathBuf> = build.outputs().iter().map(|p| canonical_key(p)).collect();
        paths.insert(canonical_key(&build.manifest_path()));
        Self { paths }
    }

    /// Check whether a change to `path` should trigger a rebuild.
    pub fn is_relevant(&self, path: &Path) -> bool {
        !self.paths.contains(&canonical_key(path))
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging (UTC, time of day)
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Run one build and report it, feeding the error tracker.
fn rebuild(build: &ProjectBuild, clear: bool, tracker: &mut ErrorTracker) {
    if clear {
        clear_screen();
    }
    println!("[{}] Building...", timestamp());
    match build.run() {
        Ok(result) => {
            let fixed = tracker.update(&result);
            print_build_result(&result, &fixed);
        }
        Err(e) => {
            eprintln!("[{}] Build failed: {}", timestamp(), e);
        }
    }
}

/// Watch the input directories of `build` and rebuild after every change.
///
/// Runs an initial build first. Build failures are reported and watching
/// continues. This function blocks until the watcher channel closes.
pub fn watch_and_rebuild(build: &ProjectBuild) -> Result<(), WatchError> {
    let dirs = build.input_dirs();
    if dirs.is_empty() {
        return Err(WatchError::NothingToWatch);
    }

    let watch_config = &build.config().watch;
    let ignored = IgnoreSet::for_build(build);

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(u64::from(watch_config.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

    for dir in &dirs {
        debouncer
            .watcher()
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: dir.clone(), source })?;
        tracing::debug!(dir = %dir.display(), "Watching");
    }

    let mut tracker = ErrorTracker::new();
    rebuild(build, watch_config.clear_screen, &mut tracker);
    println!("[{}] Watching {} director{} for changes...", timestamp(), dirs.len(), plural_y(dirs.len()));

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<&Path> = events
                    .iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path.as_path())
                    .filter(|p| ignored.is_relevant(p))
                    .collect();

                if changed.is_empty() {
                    continue;
                }
                for path in &changed {
                    println!("[{}] Changed: {}", timestamp(), path.display());
                }

                rebuild(build, watch_config.clear_screen, &mut tracker);
                println!("[{}] Watching for changes...", timestamp());
            }
            Ok(Err(error)) => {
                tracing::warn!(error = ?error, "Watch error, continuing");
            }
            Err(e) => return Err(WatchError::Channel(e.to_string())),
        }
    }
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

/// Print build result to console with fixed output notifications
fn print_build_result(result: &BuildResult, fixed: &[PathBuf]) {
    for output in fixed {
        println!("[{}] Fixed: {}", timestamp(), output.display());
    }

    if result.is_success() {
        println!(
            "[{}] Build complete ({}) - Written: {} | Skipped: {} | Files: {}",
            timestamp(),
            format_duration(result.total_duration),
            result.written_count(),
            result.skipped_count(),
            result.files_written()
        );
    } else {
        let count = result.failed_count();
        println!(
            "[{}] Build failed ({}) - {} error{}",
            timestamp(),
            format_duration(result.total_duration),
            count,
            if count == 1 { "" } else { "s" }
        );
        for report in result.failures() {
            eprintln!("[{}] Error in {}: {}", timestamp(), report.output.display(), report.status);
        }
    }
}
