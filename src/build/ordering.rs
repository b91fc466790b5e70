//! Dependency ordering of module files.
//!
//! Files are reordered in place so that a file declaring a dependency on a
//! module comes after the file declaring that module. The pass walks the list
//! once; at each position it keeps pulling the first later file the current
//! occupant depends on into the position, until the occupant has no
//! dependency further down the list.
//!
//! A dependency cycle would make that pull repeat forever. Every file that
//! has occupied the current position is remembered, so a repeat is caught as
//! soon as it happens and handled according to [`CyclePolicy`].

use crate::build::{ModuleDescriptor, ModuleError};
use std::path::PathBuf;
use thiserror::Error;

/// What to do when module dependencies form a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Fail with [`OrderError::Cycle`]
    #[default]
    Error,
    /// Log a warning and leave the files on the cycle where they are
    Keep,
}

impl CyclePolicy {
    /// Policy matching an `allow_cycles` flag.
    pub fn from_allow_cycles(allow_cycles: bool) -> Self {
        if allow_cycles {
            CyclePolicy::Keep
        } else {
            CyclePolicy::Error
        }
    }
}

/// Error during dependency ordering.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrderError {
    /// A file's declaration could not be read
    #[error(transparent)]
    Module(#[from] ModuleError),
    /// Module dependencies form a cycle
    #[error("Circular module dependency: {}", .modules.join(" -> "))]
    Cycle { modules: Vec<String> },
}

/// Reorder `files` so that module dependencies come first.
///
/// Every file's first line is read. The result is always a permutation of
/// the input.
pub fn reorder(files: &[PathBuf], policy: CyclePolicy) -> Result<Vec<PathBuf>, OrderError> {
    let descriptors =
        files.iter().map(|f| ModuleDescriptor::parse(f)).collect::<Result<Vec<_>, _>>()?;

    let ordered = order_descriptors(descriptors, policy)?;
    Ok(ordered.into_iter().map(|d| d.owner_file).collect())
}

/// Reorder parsed descriptors so that dependencies precede dependents.
pub fn order_descriptors(
    descriptors: Vec<ModuleDescriptor>,
    policy: CyclePolicy,
) -> Result<Vec<ModuleDescriptor>, OrderError> {
    let count = descriptors.len();
    let mut slots: Vec<(usize, ModuleDescriptor)> = descriptors.into_iter().enumerate().collect();

    for i in 0..count {
        // Original indices of every descriptor that has occupied slot i.
        let mut occupants = vec![slots[i].0];

        while let Some(j) = (i + 1..count).find(|&j| slots[i].1.depends_on(&slots[j].1)) {
            let incoming = slots[j].0;

            if let Some(start) = occupants.iter().position(|&o| o == incoming) {
                let mut modules: Vec<String> = occupants[start..]
                    .iter()
                    .map(|&o| label(&slots, o))
                    .collect();
                modules.push(label(&slots, incoming));

                match policy {
                    CyclePolicy::Error => return Err(OrderError::Cycle { modules }),
                    CyclePolicy::Keep => {
                        tracing::warn!(
                            cycle = %modules.join(" -> "),
                            "Circular module dependency, keeping current order"
                        );
                        break;
                    }
                }
            }

            slots.swap(i, j);
            occupants.push(incoming);
        }
    }

    Ok(slots.into_iter().map(|(_, d)| d).collect())
}

/// Module id of the descriptor that started at `original`, or its file name.
fn label(slots: &[(usize, ModuleDescriptor)], original: usize) -> String {
    slots
        .iter()
        .find(|(o, _)| *o == original)
        .map(|(_, d)| match &d.module_id {
            Some(id) => id.clone(),
            None => d.owner_file.display().to_string(),
        })
        .unwrap_or_default()
}
