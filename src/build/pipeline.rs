//! Build pipeline orchestration.
//!
//! An [`Aggregation`] resolves, orders and writes one output. The
//! [`BuildPipeline`] runs every configured aggregation in declaration order
//! and threads the set of already included files from one to the next.
//! [`ProjectBuild`] wires a pipeline to the context chosen by the project
//! configuration.

use crate::build::{
    aggregate, reorder, resolve_files, resolve_input_dir, AggregateError, AggregationReport,
    AggregationStatus, BuildContext, BuildResult, CyclePolicy, DiscoveryError, FsContext,
    IncrementalContext, ManifestError, OrderError,
};
use crate::build::discovery::canonical_key;
use crate::config::{AggregationConfig, AmdcatConfig, ConfigError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Error during build execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Project configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Input files could not be resolved
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Files could not be ordered
    #[error(transparent)]
    Order(#[from] OrderError),
    /// Output could not be written
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    /// Build manifest could not be read or written
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// One configured aggregation, ready to run.
#[derive(Debug, Clone)]
pub struct Aggregation {
    config: AggregationConfig,
    cycle_policy: CyclePolicy,
    dry_run: bool,
}

impl Aggregation {
    /// Create an aggregation from its configuration.
    pub fn new(config: AggregationConfig) -> Self {
        Self { config, cycle_policy: CyclePolicy::default(), dry_run: false }
    }

    /// Set how dependency cycles are handled.
    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    /// Set dry-run mode (resolve and order, write nothing).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The aggregation's configuration.
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Run the aggregation.
    ///
    /// `previously_included` is consulted only when `auto_exclude_wildcards`
    /// is set. In an incremental context nothing is written unless the
    /// resolved set, a file's content or the aggregation's settings changed
    /// since the output was last written.
    pub fn run(
        &self,
        previously_included: &HashSet<PathBuf>,
        ctx: &mut dyn BuildContext,
    ) -> Result<AggregationReport, BuildError> {
        let start = Instant::now();
        let config = &self.config;
        let exclusions = config.auto_exclude_wildcards.then_some(previously_included);

        // The output never counts as one of its own inputs.
        let output_key = canonical_key(&config.output);
        let mut resolved = resolve_files(config, exclusions)?;
        resolved.retain(|file| canonical_key(file) != output_key);
        let mut report = AggregationReport::new(config.output.clone(), AggregationStatus::Written);
        report.resolved = resolved.clone();

        if resolved.is_empty() {
            tracing::info!(output = %config.output.display(), "No input files, nothing to do");
            report.status = AggregationStatus::Empty;
            report.duration = start.elapsed();
            return Ok(report);
        }

        if ctx.is_incremental() && !ctx.has_delta(config, &resolved) {
            tracing::info!(output = %config.output.display(), "No changes detected, skipping");
            report.status = AggregationStatus::UpToDate;
            report.duration = start.elapsed();
            return Ok(report);
        }

        let ordered =
            if config.module_ordering { reorder(&resolved, self.cycle_policy)? } else { resolved };

        if self.dry_run {
            report.ordered = ordered;
            report.status = AggregationStatus::Planned;
            report.duration = start.elapsed();
            return Ok(report);
        }

        let written = aggregate(&ordered, config, ctx)?;
        ctx.record_included(config, &written);

        report.ordered = ordered;
        report.written = written;
        report.duration = start.elapsed();
        tracing::info!(
            output = %config.output.display(),
            files = report.written.len(),
            duration = ?report.duration,
            "Aggregated"
        );
        Ok(report)
    }
}

/// Build pipeline running aggregations in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BuildPipeline {
    aggregations: Vec<AggregationConfig>,
    cycle_policy: CyclePolicy,
    keep_going: bool,
    dry_run: bool,
}

impl BuildPipeline {
    /// Create a pipeline for a loaded project.
    ///
    /// Relative paths in the aggregations are resolved against `project_root`.
    pub fn new(config: &AmdcatConfig, project_root: &Path) -> Self {
        let aggregations =
            config.aggregations.iter().map(|a| a.resolved_against(project_root)).collect();
        Self::from_aggregations(aggregations)
            .with_cycle_policy(CyclePolicy::from_allow_cycles(config.build.allow_cycles))
            .with_keep_going(config.build.keep_going)
    }

    /// Create a pipeline from aggregation configs used as-is.
    pub fn from_aggregations(aggregations: Vec<AggregationConfig>) -> Self {
        Self { aggregations, ..Self::default() }
    }

    /// Set how dependency cycles are handled.
    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    /// Continue with the next aggregation after a failure.
    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Set dry-run mode (don't write any output).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The aggregations this pipeline runs.
    pub fn aggregations(&self) -> &[AggregationConfig] {
        &self.aggregations
    }

    /// Run every aggregation.
    ///
    /// Files resolved by one aggregation are handed to the following ones as
    /// previously included, whether or not they were written this time.
    pub fn run(&self, ctx: &mut dyn BuildContext) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new();
        let mut previously_included = HashSet::new();

        for config in &self.aggregations {
            let step = Instant::now();
            let aggregation = Aggregation::new(config.clone())
                .with_cycle_policy(self.cycle_policy)
                .with_dry_run(self.dry_run);

            match aggregation.run(&previously_included, ctx) {
                Ok(report) => {
                    previously_included.extend(report.resolved.iter().cloned());
                    result.add_report(report);
                }
                Err(e) => {
                    tracing::error!(output = %config.output.display(), error = %e, "Aggregation failed");
                    result.add_report(AggregationReport::failed(
                        config.output.clone(),
                        e.to_string(),
                        step.elapsed(),
                    ));
                    if !self.keep_going {
                        break;
                    }
                }
            }
        }

        result.total_duration = start.elapsed();
        result
    }
}

/// A configured project build: pipeline plus the context its settings call for.
#[derive(Debug, Clone)]
pub struct ProjectBuild {
    config: AmdcatConfig,
    project_root: PathBuf,
    force: bool,
    dry_run: bool,
}

impl ProjectBuild {
    /// Create a build for `config` rooted at `project_root`.
    pub fn new(config: AmdcatConfig, project_root: impl Into<PathBuf>) -> Self {
        Self { config, project_root: project_root.into(), force: false, dry_run: false }
    }

    /// Rebuild everything regardless of the manifest.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The project configuration.
    pub fn config(&self) -> &AmdcatConfig {
        &self.config
    }

    /// Directory holding the project file.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Location of the build manifest.
    pub fn manifest_path(&self) -> PathBuf {
        let manifest = &self.config.build.manifest;
        if manifest.is_absolute() {
            manifest.clone()
        } else {
            self.project_root.join(manifest)
        }
    }

    /// The pipeline for this project.
    pub fn pipeline(&self) -> BuildPipeline {
        BuildPipeline::new(&self.config, &self.project_root).with_dry_run(self.dry_run)
    }

    /// Output files of every aggregation, resolved against the project root.
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.pipeline().aggregations().iter().map(|a| a.output.clone()).collect()
    }

    /// Existing input directories of every aggregation, without duplicates.
    pub fn input_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for aggregation in self.pipeline().aggregations() {
            match resolve_input_dir(aggregation) {
                Ok(dir) if !dirs.contains(&dir) => dirs.push(dir),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping input directory"),
            }
        }
        dirs
    }

    /// Run the build.
    ///
    /// With `build.incremental` the manifest is loaded first and saved
    /// afterwards (unless this is a dry run).
    pub fn run(&self) -> Result<BuildResult, BuildError> {
        let pipeline = self.pipeline();

        if !self.config.build.incremental {
            let mut ctx = FsContext::new();
            return Ok(pipeline.run(&mut ctx));
        }

        let mut ctx = IncrementalContext::load_or_fresh(self.manifest_path()).with_force(self.force);
        let result = pipeline.run(&mut ctx);
        if !self.dry_run {
            ctx.save()?;
        }
        Ok(result)
    }
}
