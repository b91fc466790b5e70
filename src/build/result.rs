//! Build result types.
//!
//! Contains types for representing the outcome of aggregation runs.

use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a single aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationStatus {
    /// Output was (re)written
    Written,
    /// No input files matched; output left untouched
    Empty,
    /// Incremental run and no input changed; output left untouched
    UpToDate,
    /// Dry run: inputs resolved and ordered, nothing written
    Planned,
    /// Aggregation failed with error
    Failed(String),
}

impl AggregationStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, AggregationStatus::Failed(_))
    }
}

impl std::fmt::Display for AggregationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationStatus::Written => write!(f, "written"),
            AggregationStatus::Empty => write!(f, "no input files"),
            AggregationStatus::UpToDate => write!(f, "up to date"),
            AggregationStatus::Planned => write!(f, "planned"),
            AggregationStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running one aggregation.
#[derive(Debug, Clone)]
pub struct AggregationReport {
    /// Output file of the aggregation
    pub output: PathBuf,
    /// What happened
    pub status: AggregationStatus,
    /// Files resolved from the include entries, in discovery order
    pub resolved: Vec<PathBuf>,
    /// Files in emission order (after dependency ordering)
    pub ordered: Vec<PathBuf>,
    /// Files actually copied into the output
    pub written: Vec<PathBuf>,
    /// Run duration
    pub duration: Duration,
}

impl AggregationReport {
    /// Create a report with the given status and no files.
    pub fn new(output: PathBuf, status: AggregationStatus) -> Self {
        Self {
            output,
            status,
            resolved: vec![],
            ordered: vec![],
            written: vec![],
            duration: Duration::ZERO,
        }
    }

    /// Create a failed report.
    pub fn failed(output: PathBuf, error: String, duration: Duration) -> Self {
        Self { duration, ..Self::new(output, AggregationStatus::Failed(error)) }
    }

    /// Check if this aggregation succeeded.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Report for each aggregation, in run order
    pub aggregations: Vec<AggregationReport>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an aggregation report.
    pub fn add_report(&mut self, report: AggregationReport) {
        self.aggregations.push(report);
    }

    /// Number of outputs written.
    pub fn written_count(&self) -> usize {
        self.count(|s| matches!(s, AggregationStatus::Written))
    }

    /// Number of aggregations skipped (up to date or no inputs).
    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, AggregationStatus::UpToDate | AggregationStatus::Empty))
    }

    /// Number of failed aggregations.
    pub fn failed_count(&self) -> usize {
        self.count(AggregationStatus::is_failure)
    }

    fn count(&self, pred: impl Fn(&AggregationStatus) -> bool) -> usize {
        self.aggregations.iter().filter(|r| pred(&r.status)).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Total number of files copied across all outputs.
    pub fn files_written(&self) -> usize {
        self.aggregations.iter().map(|r| r.written.len()).sum()
    }

    /// Get failed reports.
    pub fn failures(&self) -> Vec<&AggregationReport> {
        self.aggregations.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let written = self.written_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.aggregations.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} written, {} skipped, {} failed ({} total)",
                written, skipped, failed, total
            ));
            for report in self.failures() {
                lines.push(format!("  - {}: {}", report.output.display(), report.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} written ({} files), {} skipped ({} total) in {:?}",
                written,
                self.files_written(),
                skipped,
                total,
                self.total_duration
            ));
        }

        lines.join("\n")
    }
}
