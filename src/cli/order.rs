//! Order command implementation

use std::path::PathBuf;
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{order_descriptors, CyclePolicy, ModuleDescriptor};

/// Run the order command
pub fn run_order(files: &[PathBuf], allow_cycles: bool) -> ExitCode {
    let parsed: Result<Vec<_>, _> = files.iter().map(|f| ModuleDescriptor::parse(f)).collect();
    let descriptors = match parsed {
        Ok(descriptors) => descriptors,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match order_descriptors(descriptors, CyclePolicy::from_allow_cycles(allow_cycles)) {
        Ok(ordered) => {
            for line in format_lines(&ordered) {
                println!("{}", line);
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// One `path  module-id` line per file; `-` marks files without a declaration.
fn format_lines(ordered: &[ModuleDescriptor]) -> Vec<String> {
    let width = ordered.iter().map(|d| d.owner_file.display().to_string().len()).max().unwrap_or(0);
    ordered
        .iter()
        .map(|d| {
            format!(
                "{:<width$}  {}",
                d.owner_file.display(),
                d.module_id.as_deref().unwrap_or("-"),
                width = width
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lines_aligns_ids() {
        let ordered = vec![
            ModuleDescriptor::from_line("lib/y.js", r#"define("mod.y",0)"#),
            ModuleDescriptor::from_line("x.js", r#"define("mod.x",["mod.y"],0)"#),
            ModuleDescriptor::inert("plain.js"),
        ];

        assert_eq!(
            format_lines(&ordered),
            vec!["lib/y.js  mod.y", "x.js      mod.x", "plain.js  -"]
        );
    }
}
