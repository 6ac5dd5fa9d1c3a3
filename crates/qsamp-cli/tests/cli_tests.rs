//! End-to-end tests of the `qsamp` binary.
//!
//! Each test writes its inputs into a temporary directory and runs the
//! built binary on them.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use qsamp_sampler::Tree;
use tempfile::TempDir;

const RUN_YAML: &str = "\
protocol:
  name: repetition
  rounds: 1
noise: bit_flip
p_max: { p: 0.05 }
shots: 200
sampler:
  seed: 3
  err_params: { p: 1.0e-3 }
";

fn qsamp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qsamp"))
        .args(args)
        .output()
        .expect("failed to launch qsamp")
}

fn write_config(dir: &Path, yaml: &str) -> String {
    let path = dir.join("run.yaml");
    fs::write(&path, yaml).unwrap();
    path.to_str().unwrap().to_string()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "qsamp failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_json_report() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), RUN_YAML);

    let report = stdout_json(&qsamp(&["run", "--config", &config, "--json"]));
    assert_eq!(report["sampler"], "subset");
    assert_eq!(report["shots"], 200);
    assert_eq!(report["stopped_early"], false);

    let low = report["stats"]["p_l_low"].as_f64().unwrap();
    let up = report["stats"]["p_l_up"].as_f64().unwrap();
    assert!(low >= 0.0);
    assert!(low <= up);
}

#[test]
fn test_run_shots_override() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), RUN_YAML);

    let report = stdout_json(&qsamp(&["run", "--config", &config, "--shots", "25", "--json"]));
    assert_eq!(report["shots"], 25);
    assert_eq!(report["total_shots"], 25);
}

#[test]
fn test_run_seeded_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), RUN_YAML);

    let a = stdout_json(&qsamp(&["run", "--config", &config, "--json"]));
    let b = stdout_json(&qsamp(&["run", "--config", &config, "--json"]));
    assert_eq!(a["stats"], b["stats"]);
}

#[test]
fn test_run_direct() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), RUN_YAML);

    let report = stdout_json(&qsamp(&["run", "--config", &config, "--direct", "--json"]));
    assert_eq!(report["sampler"], "direct");
    assert_eq!(report["stats"]["p_l_low"], report["stats"]["p_l_up"]);
}

#[test]
fn test_run_save_and_resume() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), RUN_YAML);
    let tree_path = dir.path().join("tree.json");
    let tree_arg = tree_path.to_str().unwrap();

    let first = qsamp(&["run", "--config", &config, "--save", tree_arg]);
    assert!(first.status.success());
    let tree = Tree::load(&tree_path).unwrap();
    assert_eq!(tree.node(tree.root()).count(), 200);

    let report = stdout_json(&qsamp(&[
        "run", "--config", &config, "--resume", tree_arg, "--json",
    ]));
    assert_eq!(report["shots"], 200);
    assert_eq!(report["total_shots"], 400);
}

#[test]
fn test_run_missing_config() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.yaml");

    let output = qsamp(&["run", "--config", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("File not found"));
}

#[test]
fn test_run_rejects_unknown_field() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &format!("{RUN_YAML}colour: blue\n"));

    let output = qsamp(&["run", "--config", &config]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid run configuration"));
}

#[test]
fn test_run_invalid_cutoff() {
    let dir = TempDir::new().unwrap();
    let yaml = format!("{RUN_YAML}  cutoff:\n    kind: delta_max\n    delta_max: 1.5\n");
    let config = write_config(dir.path(), &yaml);

    let output = qsamp(&["run", "--config", &config]);
    assert!(!output.status.success());
}

// ============================================================================
// inspect / merge
// ============================================================================

#[test]
fn test_inspect_and_merge() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), RUN_YAML);
    let a = dir.path().join("a.json");
    let merged = dir.path().join("merged.json");

    let run = qsamp(&["run", "--config", &config, "--save", a.to_str().unwrap()]);
    assert!(run.status.success());

    let inspect = qsamp(&["inspect", a.to_str().unwrap(), "--full"]);
    assert!(inspect.status.success());
    let text = String::from_utf8_lossy(&inspect.stdout);
    assert!(text.contains("200 shots"));
    assert!(text.contains("Direct estimate"));
    assert!(text.contains("START"));

    let merge = qsamp(&[
        "merge",
        a.to_str().unwrap(),
        a.to_str().unwrap(),
        "-o",
        merged.to_str().unwrap(),
    ]);
    assert!(merge.status.success());

    let single = Tree::load(&a).unwrap();
    let double = Tree::load(&merged).unwrap();
    assert_eq!(double.len(), single.len());
    assert_eq!(double.node(double.root()).count(), 400);
}

#[test]
fn test_inspect_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{\"format\": 1}").unwrap();

    let output = qsamp(&["inspect", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load tree"));
}
