//! amdcat - Command-line tool for concatenating and ordering AMD module sources

use std::process::ExitCode;

use amdcat::cli;

fn main() -> ExitCode {
    cli::run()
}
