//! Integration tests driving the `compound-merge` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use compound_schema_core::{
    Cardinality, DescriptorSet, Family, PropertyType, RecordDescriptor, ScalarKind,
};

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_compound-merge")
}

fn run(args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .output()
        .expect("failed to run compound-merge")
}

/// Two families of one record each; family B lacks `foo`.
fn sample_set() -> DescriptorSet {
    let mut set = DescriptorSet::new("1.0.0", "2026-08-01T00:00:00Z");
    set.name = Some("sample".to_string());
    let a = set.arena.insert(RecordDescriptor::branch("FooA").with_property(
        "foo",
        Cardinality::Single,
        PropertyType::Scalar(ScalarKind::Str),
    ));
    let b = set.arena.insert(RecordDescriptor::branch("FooB"));
    set.families.push(Family::new("a", [a]));
    set.families.push(Family::new("b", [b]));
    set
}

fn write_set(dir: &Path, name: &str, set: &DescriptorSet) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(set).unwrap()).expect("failed to write set");
    path
}

#[test]
fn validate_accepts_well_formed_sets() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_set(dir.path(), "sample.json", &sample_set());

    let output = run(&["validate", input.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Validated 1 descriptor set(s)"), "{stdout}");
}

#[test]
fn validate_rejects_malformed_sets() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = sample_set();
    set.version = String::new();
    let input = write_set(dir.path(), "broken.json", &set);

    let output = run(&["validate", input.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("version"), "{stderr}");
}

#[test]
fn merge_writes_compound_graphs_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = write_set(dir.path(), "sample.json", &sample_set());

    let output = run(&[
        "merge",
        input.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--report",
    ]);
    assert!(output.status.success(), "{output:?}");

    let compounds_raw = fs::read_to_string(out.join("sample.compounds.json")).unwrap();
    let compounds: serde_json::Value = serde_json::from_str(&compounds_raw).unwrap();
    // The absent-in-B property merges as optional.
    let foo = &compounds["compounds"][0]["properties"]["foo"];
    assert_eq!(foo["cardinality"], "optional");

    let report_raw = fs::read_to_string(out.join("sample.report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report_raw).unwrap();
    assert_eq!(report["compound_count"], 1);
    assert_eq!(report["roots"][0], "FooA");
    assert_eq!(report["content_hash"].as_str().unwrap().len(), 64);
}

#[test]
fn merge_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_set(dir.path(), "sample.json", &sample_set());

    let mut hashes = Vec::new();
    for run_dir in ["out1", "out2"] {
        let out = dir.path().join(run_dir);
        let output = run(&[
            "merge",
            input.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
            "--report",
        ]);
        assert!(output.status.success(), "{output:?}");
        let report: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.join("sample.report.json")).unwrap(),
        )
        .unwrap();
        hashes.push(report["content_hash"].as_str().unwrap().to_string());
    }
    assert_eq!(hashes[0], hashes[1]);
}

#[test]
fn merge_applies_configuration_rules() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let input = write_set(dir.path(), "sample.json", &sample_set());

    let config = serde_json::json!({
        "exclude": [{ "record": "FooA", "property": "foo" }]
    });
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, config.to_string()).unwrap();

    let output = run(&[
        "merge",
        input.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--config",
        config_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");

    let compounds: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.join("sample.compounds.json")).unwrap(),
    )
    .unwrap();
    let properties = &compounds["compounds"][0]["properties"];
    assert!(properties.get("foo").is_none(), "{properties}");
}

#[test]
fn merge_rejects_invalid_configuration_fast() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_set(dir.path(), "sample.json", &sample_set());

    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{ "exclude": [{ "record": "Foo(", "property": ".*" }] }"#,
    )
    .unwrap();

    let output = run(&[
        "merge",
        input.to_str().unwrap(),
        "--output",
        dir.path().join("out").to_str().unwrap(),
        "--config",
        config_path.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid pattern"), "{stderr}");
}

#[test]
fn merge_handles_multiple_inputs_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let first = write_set(dir.path(), "first.json", &sample_set());
    let second = write_set(dir.path(), "second.json", &sample_set());

    let output = run(&[
        "merge",
        first.to_str().unwrap(),
        second.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--jobs",
        "2",
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(out.join("first.compounds.json").exists());
    assert!(out.join("second.compounds.json").exists());
}

#[test]
fn inspect_summarizes_a_set() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_set(dir.path(), "sample.json", &sample_set());

    let output = run(&["inspect", input.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("records: 2"), "{stdout}");
    assert!(stdout.contains("a: 1 member(s)"), "{stdout}");

    let output = run(&["inspect", input.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    let summary: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(summary["records"], 2);
    assert_eq!(summary["families"][0]["members"], 1);
}

#[test]
fn yaml_inputs_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let set = sample_set();
    let path = dir.path().join("sample.yaml");
    fs::write(&path, serde_yaml_string(&set)).unwrap();

    let output = run(&["validate", path.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
}

fn serde_yaml_string(set: &DescriptorSet) -> String {
    // Round-trip through JSON to avoid YAML-specific tagging surprises.
    let value: serde_json::Value = serde_json::to_value(set).unwrap();
    serde_json::to_string(&value).unwrap()
}
