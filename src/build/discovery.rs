//! Source file discovery for aggregations.
//!
//! Expands an aggregation's include entries into an ordered, deduplicated
//! list of files. Entries containing a wildcard are matched against every
//! file below the input directory (Ant-style: `*` and `?` stay within one
//! path segment, `**` spans directories); anything else is a literal path.

use crate::config::AggregationConfig;
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Patterns excluded from every wildcard scan: VCS metadata and editor/OS droppings.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.DS_Store",
    "**/.git",
    "**/.git/**",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    "**/.hgsub",
    "**/.hgsubstate",
    "**/.hgtags",
    "**/.bzr",
    "**/.bzr/**",
    "**/.bzrignore",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Error during source discovery.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The input directory is missing or cannot be resolved
    #[error("Invalid input directory '{}': {source}", path.display())]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The input directory could not be scanned
    #[error("Failed to scan '{}': {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Check if an include entry is a wildcard pattern.
pub fn is_wildcard(entry: &str) -> bool {
    entry.contains(['*', '?'])
}

/// Determine the canonical input directory of an aggregation.
///
/// Falls back to the output file's parent directory when none is configured.
pub fn resolve_input_dir(config: &AggregationConfig) -> Result<PathBuf, DiscoveryError> {
    let dir = match &config.input_dir {
        Some(dir) => dir.clone(),
        None => match config.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };

    let canonical = dir
        .canonicalize()
        .map_err(|source| DiscoveryError::InputDir { path: dir.clone(), source })?;
    if !canonical.is_dir() {
        return Err(DiscoveryError::InputDir {
            path: dir,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    Ok(canonical)
}

/// Resolve the files an aggregation includes, in emission order.
///
/// Wildcard matches that appear in `previously_included` are skipped, which
/// lets a later aggregation pick up only what earlier ones left behind.
/// Literal entries are always kept.
pub fn resolve_files(
    config: &AggregationConfig,
    previously_included: Option<&HashSet<PathBuf>>,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let input_dir = resolve_input_dir(config)?;
    let excludes = compile_patterns(&config.excludes);
    let excluded_before: Option<HashSet<PathBuf>> =
        previously_included.map(|set| set.iter().map(|p| canonical_key(p)).collect());

    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for include in &config.includes {
        if is_wildcard(include) {
            for rel in scan(&input_dir, include, &excludes)? {
                let file = input_dir.join(&rel);
                let key = canonical_key(&file);
                if excluded_before.as_ref().is_some_and(|set| set.contains(&key)) {
                    tracing::debug!(file = %file.display(), "Skipping previously included file");
                    continue;
                }
                if seen.insert(key) {
                    files.push(file);
                }
            }
        } else {
            let literal = Path::new(include);
            let file =
                if literal.is_absolute() { literal.to_path_buf() } else { input_dir.join(literal) };
            if seen.insert(canonical_key(&file)) {
                files.push(file);
            }
        }
    }

    tracing::debug!(
        output = %config.output.display(),
        count = files.len(),
        "Resolved aggregation inputs"
    );
    Ok(files)
}

/// Scan `base_dir` for files matching `include` and none of `excludes`.
///
/// Returns `/`-separated paths relative to `base_dir`, sorted
/// lexicographically. A malformed include pattern matches nothing.
pub fn scan(
    base_dir: &Path,
    include: &str,
    excludes: &[Pattern],
) -> Result<Vec<String>, DiscoveryError> {
    let Some(include) = compile_pattern(include) else {
        return Ok(Vec::new());
    };
    let defaults = default_patterns();

    let walker = WalkDir::new(base_dir).follow_links(true).into_iter().filter_entry(|entry| {
        // Never descend into VCS metadata directories.
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let rel = relative_path(base_dir, entry.path());
        !defaults.iter().any(|p| p.matches_with(&rel, MATCH_OPTIONS))
    });

    let mut matches = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(DiscoveryError::Walk { path: base_dir.to_path_buf(), source: e });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error reading path during scan, skipping");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative_path(base_dir, entry.path());
        if !include.matches_with(&rel, MATCH_OPTIONS) {
            continue;
        }
        let excluded = excludes
            .iter()
            .chain(defaults.iter())
            .any(|p| p.matches_with(&rel, MATCH_OPTIONS));
        if !excluded {
            matches.push(rel);
        }
    }

    matches.sort();
    Ok(matches)
}

/// Compile user patterns, dropping malformed ones.
pub fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns.iter().filter_map(|p| compile_pattern(p)).collect()
}

fn default_patterns() -> Vec<Pattern> {
    DEFAULT_EXCLUDES.iter().filter_map(|p| Pattern::new(p).ok()).collect()
}

fn compile_pattern(pattern: &str) -> Option<Pattern> {
    let mut normalized = pattern.replace('\\', "/");
    if normalized.ends_with('/') {
        normalized.push_str("**");
    }
    match Pattern::new(&normalized) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Invalid glob pattern, it will match nothing");
            None
        }
    }
}

/// Path of `path` below `base`, joined with `/`.
fn relative_path(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical form of a path for identity comparisons.
///
/// A path that does not exist yet keys on its canonical parent, or on the
/// path as given when the parent is missing too.
pub(crate) fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
