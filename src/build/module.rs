//! Module declarations read from the first line of a source file.
//!
//! A file takes part in dependency ordering when its first line looks like
//!
//! ```text
//! define("app.main",["app.util","app.dom"],function(util, dom){
//! ```
//!
//! The dependency array is optional. Anything else on line 1 makes the file
//! inert: it is still aggregated, but it neither exposes a module id nor
//! depends on anything.

use regex::Regex;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static DEFINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*define\(\s*"(.*?)"\s*,\s*(?:\[(.*?)\]\s*,)?.*$"#)
        .expect("define pattern is valid")
});

/// Error reading a module declaration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleError {
    /// The file could not be opened or its first line read
    #[error("Failed to read module declaration from '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Module identity and dependencies of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// File the declaration was read from
    pub owner_file: PathBuf,
    /// Declared module id, `None` when line 1 is not a declaration
    pub module_id: Option<String>,
    /// Ids of the modules this file depends on
    pub dependency_ids: BTreeSet<String>,
}

impl ModuleDescriptor {
    /// Descriptor for a file without a declaration.
    pub fn inert(owner_file: impl Into<PathBuf>) -> Self {
        Self { owner_file: owner_file.into(), module_id: None, dependency_ids: BTreeSet::new() }
    }

    /// Read the first line of `path` and parse its declaration.
    pub fn parse(path: &Path) -> Result<Self, ModuleError> {
        let line = read_first_line(path)
            .map_err(|source| ModuleError::Read { path: path.to_path_buf(), source })?;

        let descriptor = match line {
            Some(line) => Self::from_line(path, &line),
            None => Self::inert(path),
        };
        tracing::debug!(
            file = %path.display(),
            module = ?descriptor.module_id,
            deps = descriptor.dependency_ids.len(),
            "Parsed module declaration"
        );
        Ok(descriptor)
    }

    /// Parse a declaration line on behalf of `owner_file`.
    pub fn from_line(owner_file: impl Into<PathBuf>, line: &str) -> Self {
        let Some(caps) = DEFINE_RE.captures(line) else {
            return Self::inert(owner_file);
        };

        let module_id = caps.get(1).map(|m| m.as_str().to_string());
        let dependency_ids = caps
            .get(2)
            .map(|deps| parse_dependency_list(deps.as_str()))
            .unwrap_or_default();

        Self { owner_file: owner_file.into(), module_id, dependency_ids }
    }

    /// Whether this file declares a module.
    pub fn is_module(&self) -> bool {
        self.module_id.is_some()
    }

    /// Whether this file depends on the module declared by `other`.
    pub fn depends_on(&self, other: &ModuleDescriptor) -> bool {
        other.module_id.as_ref().is_some_and(|id| self.dependency_ids.contains(id))
    }
}

/// Split `"a", "b"` into unquoted ids.
fn parse_dependency_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter_map(|token| {
            let mut chars = token.chars();
            chars.next()?;
            chars.next_back()?;
            Some(chars.as_str().to_string())
        })
        .collect()
}

/// First line of a file without its terminator, or `None` for an empty file.
fn read_first_line(path: &Path) -> std::io::Result<Option<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    let line = String::from_utf8_lossy(&buf);
    let line = line.strip_prefix('\u{feff}').unwrap_or(line.as_ref());
    Ok(Some(line.to_string()))
}
