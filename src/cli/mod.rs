//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod concat;
mod order;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

pub use build::BuildOptions;
pub use concat::ConcatOptions;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// amdcat - Concatenate source files, ordering AMD modules by dependency
#[derive(Parser)]
#[command(name = "amdcat")]
#[command(about = "amdcat - Concatenate source files, ordering AMD modules by dependency")]
#[command(version)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every aggregation from amdcat.toml
    Build {
        /// Path to amdcat.toml (default: search upward from the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Rebuild everything, ignoring the manifest
        #[arg(short, long)]
        force: bool,

        /// Keep the current order of files on a dependency cycle instead of failing
        #[arg(long)]
        allow_cycles: bool,

        /// Continue with the remaining aggregations after a failure
        #[arg(long)]
        keep_going: bool,

        /// Always do a full build without reading or writing the manifest
        #[arg(long)]
        no_incremental: bool,

        /// Resolve and order inputs, print the plan, write nothing
        #[arg(long, conflicts_with = "watch")]
        dry_run: bool,

        /// Rebuild whenever an input changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Run one ad-hoc aggregation without a project file
    Concat {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Directory include patterns are resolved against (default: output's directory)
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// File or glob pattern to include, in order (repeatable)
        #[arg(long = "include", value_name = "PATTERN", required = true)]
        includes: Vec<String>,

        /// Glob pattern to exclude (repeatable)
        #[arg(long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,

        /// Delete each input after it was copied
        #[arg(long)]
        remove_included: bool,

        /// Append a newline after each file
        #[arg(long)]
        new_line: bool,

        /// Write a /*name*/ comment before each file
        #[arg(long)]
        file_header: bool,

        /// Append a semicolon after each file
        #[arg(long)]
        fix_semicolon: bool,

        /// Order AMD modules so dependencies come first
        #[arg(short, long)]
        module_ordering: bool,

        /// Keep the current order of files on a dependency cycle instead of failing
        #[arg(long)]
        allow_cycles: bool,
    },

    /// Print files in dependency order with their module ids
    Order {
        /// Files to order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Keep the current order of files on a dependency cycle instead of failing
        #[arg(long)]
        allow_cycles: bool,
    },
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` is honoured unless `verbose` asks for debug output.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            config,
            force,
            allow_cycles,
            keep_going,
            no_incremental,
            dry_run,
            watch,
        } => build::run_build(&BuildOptions {
            config,
            force,
            allow_cycles,
            keep_going,
            no_incremental,
            dry_run,
            watch,
            verbose: cli.verbose,
        }),
        Commands::Concat {
            output,
            input_dir,
            includes,
            excludes,
            remove_included,
            new_line,
            file_header,
            fix_semicolon,
            module_ordering,
            allow_cycles,
        } => concat::run_concat(&ConcatOptions {
            output,
            input_dir,
            includes,
            excludes,
            remove_included,
            new_line,
            file_header,
            fix_semicolon,
            module_ordering,
            allow_cycles,
        }),
        Commands::Order { files, allow_cycles } => order::run_order(&files, allow_cycles),
    }
}
