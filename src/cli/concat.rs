//! Ad-hoc concat command implementation

use std::path::PathBuf;
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{AggregationReport, AggregationStatus, ProjectBuild};
use crate::config::{default_config, AggregationConfig, AmdcatConfig};

/// Flags of the concat command
#[derive(Debug, Clone, Default)]
pub struct ConcatOptions {
    pub output: PathBuf,
    pub input_dir: Option<PathBuf>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub remove_included: bool,
    pub new_line: bool,
    pub file_header: bool,
    pub fix_semicolon: bool,
    pub module_ordering: bool,
    pub allow_cycles: bool,
}

impl ConcatOptions {
    /// Single-aggregation, non-incremental configuration for these flags.
    fn to_config(&self) -> AmdcatConfig {
        let mut aggregation = AggregationConfig::new(&self.output)
            .with_remove_included(self.remove_included)
            .with_new_line(self.new_line)
            .with_file_header(self.file_header)
            .with_fix_semicolon(self.fix_semicolon)
            .with_module_ordering(self.module_ordering);
        aggregation.input_dir = self.input_dir.clone();
        aggregation.includes = self.includes.clone();
        aggregation.excludes = self.excludes.clone();

        let mut config = default_config();
        config.build.incremental = false;
        config.build.allow_cycles = self.allow_cycles;
        config.aggregations.push(aggregation);
        config
    }
}

/// Run the concat command
pub fn run_concat(options: &ConcatOptions) -> ExitCode {
    let config = options.to_config();

    let errors = config.validate();
    if !errors.is_empty() {
        for error in errors {
            eprintln!("Error: '{}' {}", error.field, error.message);
        }
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: cannot determine current directory: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let result = match ProjectBuild::new(config, root).run() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match result.aggregations.first() {
        Some(report) if report.is_success() => {
            println!("{}", summary_line(report));
            ExitCode::from(EXIT_SUCCESS)
        }
        Some(report) => {
            eprintln!("Error: {}", report.status);
            ExitCode::from(EXIT_ERROR)
        }
        None => ExitCode::from(EXIT_ERROR),
    }
}

/// One-line outcome of a successful concat.
fn summary_line(report: &AggregationReport) -> String {
    match report.status {
        AggregationStatus::Written => format!(
            "Wrote {} file{} to {}",
            report.written.len(),
            if report.written.len() == 1 { "" } else { "s" },
            report.output.display()
        ),
        _ => format!("{}: {}", report.output.display(), report.status),
    }
}
