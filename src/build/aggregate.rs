//! Concatenation of resolved files into the aggregation output.

use crate::build::discovery::canonical_key;
use crate::build::BuildContext;
use crate::config::AggregationConfig;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while writing an aggregation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AggregateError {
    /// The output's parent directory could not be created
    #[error("Failed to create output directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    /// The output could not be opened
    #[error("Failed to open output '{}': {source}", path.display())]
    OpenOutput { path: PathBuf, source: io::Error },
    /// A source file could not be opened or read
    #[error("Failed to read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// Writing to the output failed
    #[error("Failed to write output '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    /// A source file could not be removed after inclusion
    #[error("Failed to remove included file '{}': {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// Header comment written before a file when `insert_file_header` is set.
pub fn file_header(file: &Path, insert_new_line: bool) -> String {
    let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let mut header = format!("/*{}*/", name);
    if insert_new_line {
        header.push('\n');
    }
    header
}

/// Canonical location of an output file, creating its parent directories.
pub fn prepare_output(output: &Path) -> Result<PathBuf, AggregateError> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .map_err(|source| AggregateError::CreateDir { path: parent.clone(), source })?;
    let parent = parent
        .canonicalize()
        .map_err(|source| AggregateError::CreateDir { path: parent.clone(), source })?;

    Ok(match output.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

/// Concatenate `files` into `config.output`.
///
/// Nothing is written when `files` is empty. The output itself is never
/// copied into itself. Returns the files that were copied.
pub fn aggregate(
    files: &[PathBuf],
    config: &AggregationConfig,
    ctx: &mut dyn BuildContext,
) -> Result<Vec<PathBuf>, AggregateError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let output = prepare_output(&config.output)?;
    let output_key = canonical_key(&output);
    let writer = ctx
        .new_output(&output)
        .map_err(|source| AggregateError::OpenOutput { path: output.clone(), source })?;
    let mut out = BufWriter::new(writer);
    let write_err = |source: io::Error| AggregateError::Write { path: output.clone(), source };

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        if canonical_key(file) == output_key {
            tracing::debug!(file = %file.display(), "Skipping the aggregation output itself");
            continue;
        }

        append_file(file, config, &mut out, &output)?;

        if config.remove_included {
            fs::remove_file(file)
                .map_err(|source| AggregateError::Remove { path: file.clone(), source })?;
            ctx.refresh(file);
        }
        tracing::debug!(file = %file.display(), output = %output.display(), "Appended");
        written.push(file.clone());
    }

    out.flush().map_err(write_err)?;
    Ok(written)
}

/// Copy one file into `out` with the configured decorations.
fn append_file(
    file: &Path,
    config: &AggregationConfig,
    out: &mut impl Write,
    output: &Path,
) -> Result<(), AggregateError> {
    let write_err = |source: io::Error| AggregateError::Write { path: output.to_path_buf(), source };

    let mut input =
        File::open(file).map_err(|source| AggregateError::Read { path: file.to_path_buf(), source })?;

    if config.insert_file_header {
        out.write_all(file_header(file, config.insert_new_line).as_bytes()).map_err(write_err)?;
    }

    copy_all(&mut input, out).map_err(|e| match e {
        CopyError::Read(source) => AggregateError::Read { path: file.to_path_buf(), source },
        CopyError::Write(source) => write_err(source),
    })?;

    if config.fix_last_semicolon {
        out.write_all(b";").map_err(write_err)?;
    }
    if config.insert_new_line {
        out.write_all(b"\n").map_err(write_err)?;
    }
    Ok(())
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// `io::copy` that tells read failures apart from write failures.
fn copy_all(input: &mut impl io::Read, out: &mut impl Write) -> Result<u64, CopyError> {
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        out.write_all(&buf[..n]).map_err(CopyError::Write)?;
        total += n as u64;
    }
}
