//! Aggregation integration tests.
//!
//! Drives the public library API end to end: pattern resolution, module
//! ordering, concatenation, multi-aggregation pipelines and incremental
//! rebuilds against real temporary directory trees.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use amdcat::build::{
    resolve_files, Aggregation, AggregationStatus, BuildContext, BuildPipeline, CyclePolicy,
    FsContext, IncrementalContext, ProjectBuild,
};
use amdcat::config::loader::parse_config;
use amdcat::config::AggregationConfig;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a test file with content.
fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect()
}

fn run_one(config: AggregationConfig) -> amdcat::build::AggregationReport {
    let mut ctx = FsContext::new();
    Aggregation::new(config).run(&HashSet::new(), &mut ctx).unwrap()
}

// ============================================================================
// Concatenation scenarios
// ============================================================================

#[test]
fn test_literal_includes_in_order() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "a.js", "var a = 1;\n");
    create_test_file(temp.path(), "b.js", "var b = 2;\n");

    let report = run_one(
        AggregationConfig::new(temp.path().join("out/all.js"))
            .with_input_dir(temp.path())
            .include("b.js")
            .include("a.js"),
    );

    assert_eq!(file_names(&report.written), vec!["b.js", "a.js"]);
    assert_eq!(
        fs::read_to_string(temp.path().join("out/all.js")).unwrap(),
        "var b = 2;\nvar a = 1;\n"
    );
}

#[test]
fn test_module_ordering_puts_dependency_first() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "x.js", "define(\"mod.x\",[\"mod.y\"],function(){})\n");
    create_test_file(temp.path(), "y.js", "define(\"mod.y\",function(){})\n");

    let report = run_one(
        AggregationConfig::new(temp.path().join("out/all.js"))
            .with_input_dir(temp.path())
            .include("x.js")
            .include("y.js")
            .with_module_ordering(true),
    );

    assert_eq!(file_names(&report.written), vec!["y.js", "x.js"]);
    assert_eq!(
        fs::read_to_string(temp.path().join("out/all.js")).unwrap(),
        "define(\"mod.y\",function(){})\ndefine(\"mod.x\",[\"mod.y\"],function(){})\n"
    );
}

#[test]
fn test_header_newline_and_semicolon() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "util.js", "var x=1");

    run_one(
        AggregationConfig::new(temp.path().join("out/all.js"))
            .with_input_dir(temp.path())
            .include("util.js")
            .with_file_header(true)
            .with_fix_semicolon(true)
            .with_new_line(true),
    );

    assert_eq!(
        fs::read_to_string(temp.path().join("out/all.js")).unwrap(),
        "/*util.js*/\nvar x=1;\n"
    );
}

#[test]
fn test_wildcards_are_sorted_and_deduplicated() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/main.js", "M");
    create_test_file(temp.path(), "src/lib/b.js", "B");
    create_test_file(temp.path(), "src/lib/a.js", "A");
    create_test_file(temp.path(), "src/lib/a.min.js", "MIN");

    let report = run_one(
        AggregationConfig::new(temp.path().join("out/all.js"))
            .with_input_dir(temp.path().join("src"))
            .include("main.js")
            .include("lib/**/*.js")
            .include("**/*.js")
            .exclude("**/*.min.js"),
    );

    assert_eq!(file_names(&report.written), vec!["main.js", "a.js", "b.js"]);
    assert_eq!(fs::read_to_string(temp.path().join("out/all.js")).unwrap(), "MAB");
}

#[test]
fn test_default_excludes_drop_vcs_and_os_files() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/app.js", "APP");
    create_test_file(temp.path(), "src/.git/hooks/pre-commit.js", "GIT");
    create_test_file(temp.path(), "src/.DS_Store", "DS");
    create_test_file(temp.path(), "src/sub/.DS_Store", "DS");

    let config =
        AggregationConfig::new(temp.path().join("out/all.js")).with_input_dir(temp.path().join("src")).include("**");
    let resolved = resolve_files(&config, None).unwrap();

    assert_eq!(file_names(&resolved), vec!["app.js"]);
}

#[test]
fn test_resolution_is_idempotent() {
    let temp = TempDir::new().unwrap();
    for name in ["c.js", "a.js", "nested/b.js"] {
        create_test_file(temp.path(), name, "x");
    }
    let config = AggregationConfig::new(temp.path().join("out.txt"))
        .with_input_dir(temp.path())
        .include("**/*.js");

    let first = resolve_files(&config, None).unwrap();
    let second = resolve_files(&config, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_no_matches_leaves_output_untouched() {
    let temp = TempDir::new().unwrap();
    let output = create_test_file(temp.path(), "all.js", "PREVIOUS");

    let report = run_one(
        AggregationConfig::new(&output).with_input_dir(temp.path()).include("*.coffee"),
    );

    assert_eq!(report.status, AggregationStatus::Empty);
    assert!(report.written.is_empty());
    assert_eq!(fs::read_to_string(&output).unwrap(), "PREVIOUS");
}

#[test]
fn test_output_is_never_part_of_its_content() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "a.js", "A");
    create_test_file(temp.path(), "b.js", "B");
    let output = temp.path().join("all.js");
    let config = AggregationConfig::new(&output).include("*.js");

    run_one(config.clone());
    run_one(config);

    assert_eq!(fs::read_to_string(&output).unwrap(), "AB");
}

#[test]
fn test_remove_included_deletes_sources() {
    let temp = TempDir::new().unwrap();
    let a = create_test_file(temp.path(), "parts/a.css", "a{}");
    let b = create_test_file(temp.path(), "parts/b.css", "b{}");

    let report = run_one(
        AggregationConfig::new(temp.path().join("site.css"))
            .with_input_dir(temp.path().join("parts"))
            .include("*.css")
            .with_remove_included(true),
    );

    assert_eq!(report.written.len(), 2);
    assert!(!a.exists());
    assert!(!b.exists());
    assert_eq!(fs::read_to_string(temp.path().join("site.css")).unwrap(), "a{}b{}");
}

// ============================================================================
// Dependency cycles
// ============================================================================

#[test]
fn test_cycle_fails_by_default_and_names_modules() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "a.js", "define(\"a\",[\"b\"],function(){})");
    create_test_file(temp.path(), "b.js", "define(\"b\",[\"a\"],function(){})");
    let config = AggregationConfig::new(temp.path().join("out/all.js"))
        .with_input_dir(temp.path())
        .include("*.js")
        .with_module_ordering(true);

    let mut ctx = FsContext::new();
    let err = Aggregation::new(config).run(&HashSet::new(), &mut ctx).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a -> b -> a"), "unexpected message: {}", message);
}

#[test]
fn test_cycle_tolerated_when_allowed() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "a.js", "define(\"a\",[\"b\"],0)");
    create_test_file(temp.path(), "b.js", "define(\"b\",[\"a\"],0)");
    create_test_file(temp.path(), "c.js", "define(\"c\",0)");
    let config = AggregationConfig::new(temp.path().join("out/all.js"))
        .with_input_dir(temp.path())
        .include("*.js")
        .with_module_ordering(true);

    let mut ctx = FsContext::new();
    let report = Aggregation::new(config)
        .with_cycle_policy(CyclePolicy::Keep)
        .run(&HashSet::new(), &mut ctx)
        .unwrap();

    let mut names = file_names(&report.written);
    names.sort();
    assert_eq!(names, vec!["a.js", "b.js", "c.js"]);
}

// ============================================================================
// Multi-aggregation pipelines
// ============================================================================

#[test]
fn test_auto_exclude_skips_previously_included() {
    let temp = TempDir::new().unwrap();
    let a = create_test_file(temp.path(), "a.js", "A");
    create_test_file(temp.path(), "b.js", "B");
    let previously: HashSet<PathBuf> = [a].into_iter().collect();

    let mut ctx = FsContext::new();
    let report = Aggregation::new(
        AggregationConfig::new(temp.path().join("out/rest.js"))
            .with_input_dir(temp.path())
            .include("*.js")
            .with_auto_exclude(true),
    )
    .run(&previously, &mut ctx)
    .unwrap();

    assert_eq!(file_names(&report.written), vec!["b.js"]);
}

#[test]
fn test_auto_exclude_keeps_literal_entries() {
    let temp = TempDir::new().unwrap();
    let a = create_test_file(temp.path(), "a.js", "A");
    let previously: HashSet<PathBuf> = [a].into_iter().collect();

    let mut ctx = FsContext::new();
    let report = Aggregation::new(
        AggregationConfig::new(temp.path().join("out/again.js"))
            .with_input_dir(temp.path())
            .include("a.js")
            .with_auto_exclude(true),
    )
    .run(&previously, &mut ctx)
    .unwrap();

    assert_eq!(file_names(&report.written), vec!["a.js"]);
}

#[test]
fn test_pipeline_from_project_file() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/core/dom.js", "define(\"dom\",[\"base\"],0);");
    create_test_file(temp.path(), "src/core/base.js", "define(\"base\",0);");
    create_test_file(temp.path(), "src/widgets/menu.js", "menu();");
    create_test_file(temp.path(), "src/widgets/tabs.js", "tabs();");

    let config = parse_config(
        r#"
[project]
name = "site"

[build]
incremental = false

[[aggregation]]
output = "build/core.js"
input_dir = "src"
includes = ["core/*.js"]
module_ordering = true
insert_new_line = true

[[aggregation]]
output = "build/all.js"
input_dir = "src"
includes = ["**/*.js"]
auto_exclude_wildcards = true
"#,
    )
    .unwrap();

    let result = ProjectBuild::new(config, temp.path()).run().unwrap();
    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.written_count(), 2);

    assert_eq!(
        fs::read_to_string(temp.path().join("build/core.js")).unwrap(),
        "define(\"base\",0);\ndefine(\"dom\",[\"base\"],0);\n"
    );
    assert_eq!(fs::read_to_string(temp.path().join("build/all.js")).unwrap(), "menu();tabs();");
    assert!(!temp.path().join(".amdcat-manifest.json").exists());
}

#[test]
fn test_pipeline_keep_going_reports_every_failure() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "a.js", "define(\"a\",[\"b\"],0)");
    create_test_file(temp.path(), "b.js", "define(\"b\",[\"a\"],0)");
    create_test_file(temp.path(), "ok.txt", "fine");

    let pipeline = BuildPipeline::from_aggregations(vec![
        AggregationConfig::new(temp.path().join("out/modules.js"))
            .with_input_dir(temp.path())
            .include("*.js")
            .with_module_ordering(true),
        AggregationConfig::new(temp.path().join("out/notes.txt"))
            .with_input_dir(temp.path())
            .include("*.txt"),
    ])
    .with_keep_going(true);

    let mut ctx = FsContext::new();
    let result = pipeline.run(&mut ctx);

    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.written_count(), 1);
    assert!(result.summary().contains("modules.js"));
    assert_eq!(fs::read_to_string(temp.path().join("out/notes.txt")).unwrap(), "fine");
}

// ============================================================================
// Incremental builds
// ============================================================================

fn incremental_project(root: &Path) -> ProjectBuild {
    let config = parse_config(
        r#"
[project]
name = "inc"

[[aggregation]]
output = "build/js.js"
input_dir = "src"
includes = ["*.js"]

[[aggregation]]
output = "build/css.css"
input_dir = "src"
includes = ["*.css"]
"#,
    )
    .unwrap();
    ProjectBuild::new(config, root)
}

#[test]
fn test_unchanged_tree_writes_nothing() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/a.js", "A");
    create_test_file(temp.path(), "src/a.css", "a{}");
    let build = incremental_project(temp.path());

    let first = build.run().unwrap();
    assert_eq!(first.written_count(), 2);

    let second = build.run().unwrap();
    assert_eq!(second.written_count(), 0);
    assert_eq!(second.skipped_count(), 2);
    assert!(second.aggregations.iter().all(|r| r.status == AggregationStatus::UpToDate));
}

#[test]
fn test_changed_input_reruns_only_its_aggregation() {
    let temp = TempDir::new().unwrap();
    let js = create_test_file(temp.path(), "src/a.js", "A");
    create_test_file(temp.path(), "src/a.css", "a{}");
    let build = incremental_project(temp.path());
    build.run().unwrap();

    fs::write(&js, "A changed").unwrap();
    let result = build.run().unwrap();

    assert_eq!(result.aggregations[0].status, AggregationStatus::Written);
    assert_eq!(result.aggregations[1].status, AggregationStatus::UpToDate);
    assert_eq!(fs::read_to_string(temp.path().join("build/js.js")).unwrap(), "A changed");
}

#[test]
fn test_shared_input_reruns_every_aggregation_using_it() {
    let temp = TempDir::new().unwrap();
    let a = create_test_file(temp.path(), "src/a.js", "A");
    let config = parse_config(
        r#"
[project]
name = "shared"

[[aggregation]]
output = "build/one.js"
input_dir = "src"
includes = ["a.js"]

[[aggregation]]
output = "build/two.js"
input_dir = "src"
includes = ["a.js"]
"#,
    )
    .unwrap();
    let build = ProjectBuild::new(config, temp.path());
    build.run().unwrap();

    fs::write(&a, "A2").unwrap();
    let result = build.run().unwrap();

    assert_eq!(result.written_count(), 2);
    assert_eq!(fs::read_to_string(temp.path().join("build/one.js")).unwrap(), "A2");
    assert_eq!(fs::read_to_string(temp.path().join("build/two.js")).unwrap(), "A2");
}

#[test]
fn test_removed_input_triggers_rebuild() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/a.js", "A");
    let b = create_test_file(temp.path(), "src/b.js", "B");
    let build = incremental_project(temp.path());
    build.run().unwrap();
    assert_eq!(fs::read_to_string(temp.path().join("build/js.js")).unwrap(), "AB");

    fs::remove_file(&b).unwrap();
    let result = build.run().unwrap();

    assert_eq!(result.aggregations[0].status, AggregationStatus::Written);
    assert_eq!(fs::read_to_string(temp.path().join("build/js.js")).unwrap(), "A");
}

#[test]
fn test_changed_settings_trigger_rebuild() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/a.js", "A");
    let project = |fix: bool| {
        let config = parse_config(&format!(
            r#"
[project]
name = "flags"

[[aggregation]]
output = "build/js.js"
input_dir = "src"
includes = ["*.js"]
fix_last_semicolon = {}
"#,
            fix
        ))
        .unwrap();
        ProjectBuild::new(config, temp.path())
    };

    project(false).run().unwrap();
    assert_eq!(fs::read_to_string(temp.path().join("build/js.js")).unwrap(), "A");

    let result = project(true).run().unwrap();
    assert_eq!(result.aggregations[0].status, AggregationStatus::Written);
    assert_eq!(fs::read_to_string(temp.path().join("build/js.js")).unwrap(), "A;");

    let result = project(true).run().unwrap();
    assert_eq!(result.aggregations[0].status, AggregationStatus::UpToDate);
}

#[test]
fn test_new_input_triggers_rebuild() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/a.js", "A");
    let build = incremental_project(temp.path());
    build.run().unwrap();

    create_test_file(temp.path(), "src/b.js", "B");
    let result = build.run().unwrap();

    assert_eq!(result.aggregations[0].status, AggregationStatus::Written);
    assert_eq!(fs::read_to_string(temp.path().join("build/js.js")).unwrap(), "AB");
}

#[test]
fn test_deleted_output_is_rebuilt() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/a.js", "A");
    let build = incremental_project(temp.path());
    build.run().unwrap();

    fs::remove_file(temp.path().join("build/js.js")).unwrap();
    let result = build.run().unwrap();

    assert_eq!(result.aggregations[0].status, AggregationStatus::Written);
    assert!(temp.path().join("build/js.js").exists());
}

#[test]
fn test_skipped_aggregation_still_excludes_its_files() {
    let temp = TempDir::new().unwrap();
    create_test_file(temp.path(), "src/core.js", "CORE");
    create_test_file(temp.path(), "src/extra.js", "EXTRA");
    let config = parse_config(
        r#"
[project]
name = "chain"

[[aggregation]]
output = "build/core.js"
input_dir = "src"
includes = ["core.js"]

[[aggregation]]
output = "build/rest.js"
input_dir = "src"
includes = ["*.js"]
auto_exclude_wildcards = true
"#,
    )
    .unwrap();
    let build = ProjectBuild::new(config, temp.path());
    build.run().unwrap();

    create_test_file(temp.path(), "src/more.js", "MORE");
    let result = build.run().unwrap();

    assert_eq!(result.aggregations[0].status, AggregationStatus::UpToDate);
    assert_eq!(result.aggregations[1].status, AggregationStatus::Written);
    assert_eq!(fs::read_to_string(temp.path().join("build/rest.js")).unwrap(), "EXTRAMORE");
}

#[test]
fn test_incremental_context_round_trip() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("manifest.json");
    let a = create_test_file(temp.path(), "a.js", "A");

    let mut ctx = IncrementalContext::load(&manifest).unwrap();
    assert!(!ctx.is_incremental());
    let config = AggregationConfig::new(temp.path().join("out.js")).include("a.js");
    ctx.record_included(&config, &[a.clone()]);
    ctx.save().unwrap();

    let ctx = IncrementalContext::load(&manifest).unwrap();
    assert!(ctx.is_incremental());
    assert!(ctx.has_delta(&config, &[a.clone()]), "output was never written, so it counts as a change");

    fs::write(temp.path().join("out.js"), "A").unwrap();
    assert!(!ctx.has_delta(&config, &[a.clone()]));
    assert!(ctx.has_delta(&config, &[a.clone(), temp.path().join("b.js")]));
    assert!(ctx.has_delta(&config.clone().with_file_header(true), &[a]));

    let forced = IncrementalContext::load(&manifest).unwrap().with_force(true);
    assert!(!forced.is_incremental());
}
