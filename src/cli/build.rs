//! Build command implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildResult, ProjectBuild};
use crate::config::loader::{load_config, merge_cli_overrides, project_root, CliOverrides};

/// Flags of the build command
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub config: Option<PathBuf>,
    pub force: bool,
    pub allow_cycles: bool,
    pub keep_going: bool,
    pub no_incremental: bool,
    pub dry_run: bool,
    pub watch: bool,
    pub verbose: bool,
}

impl BuildOptions {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            incremental: self.no_incremental.then_some(false),
            allow_cycles: self.allow_cycles.then_some(true),
            keep_going: self.keep_going.then_some(true),
        }
    }
}

/// Run the build command
pub fn run_build(options: &BuildOptions) -> ExitCode {
    let (mut config, config_path) = match load_config(options.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if options.verbose {
        println!("Using config: {}", config_path.display());
    }

    merge_cli_overrides(&mut config, &options.overrides());

    let root = resolve_root(&config_path);
    let build = ProjectBuild::new(config, root)
        .with_force(options.force)
        .with_dry_run(options.dry_run);

    if options.watch {
        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        return match crate::watch::watch_and_rebuild(&build) {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    let result = match build.run() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Build error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if options.dry_run {
        print_plan(&result);
    }

    if result.is_success() {
        println!("{}", result.summary());
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprintln!("{}", result.summary());
        ExitCode::from(EXIT_ERROR)
    }
}

/// Canonical project root for a config file path.
fn resolve_root(config_path: &Path) -> PathBuf {
    let root = match project_root(config_path) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    root.canonicalize().unwrap_or(root)
}

fn print_plan(result: &BuildResult) {
    println!("Dry run - would build:");
    for report in &result.aggregations {
        println!("  {} ({})", report.output.display(), report.status);
        for file in &report.ordered {
            println!("    - {}", file.display());
        }
    }
}
