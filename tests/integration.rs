use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env(strategy: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/recall.sqlite"

[search]
strategy = "{}"

[retrieval]
incident_min_score = 0.7
incident_limit = 5
fragment_min_score = 0.6
fragment_limit = 15
"#,
        root.display(),
        strategy
    );

    let config_path = config_dir.join("recall.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_recall(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_recall"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run recall binary: {}", e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("fallback");

    let (stdout, stderr, success) = run_recall(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/recall.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("native");

    let (_, _, success1) = run_recall(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_recall(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_stats_on_empty_database() {
    let (_tmp, config_path) = setup_test_env("native");

    run_recall(&config_path, &["init"]);
    let (stdout, stderr, success) = run_recall(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Search:      native"), "got: {}", stdout);
    assert!(stdout.contains("Incidents: 0"));
    assert!(stdout.contains("Fragments: 0"));
    assert!(stdout.contains("embeddings: 0"));
}

#[test]
fn test_embed_clear_on_empty_database() {
    let (_tmp, config_path) = setup_test_env("fallback");

    run_recall(&config_path, &["init"]);
    let (stdout, stderr, success) = run_recall(&config_path, &["embed", "clear"]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.contains("incident embeddings removed: 0"));
    assert!(stdout.contains("fragment embeddings removed: 0"));
}

#[test]
fn test_embed_requires_provider() {
    let (_tmp, config_path) = setup_test_env("fallback");

    run_recall(&config_path, &["init"]);
    let (_, stderr, success) = run_recall(&config_path, &["embed", "incident", "1"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "got: {}", stderr);

    let (_, _, success) = run_recall(
        &config_path,
        &["embed", "batch", "--incidents", "1,2", "--fragments", "3"],
    );
    assert!(!success);
}

#[test]
fn test_retrieve_requires_provider() {
    let (_tmp, config_path) = setup_test_env("fallback");

    run_recall(&config_path, &["init"]);
    let (_, stderr, success) = run_recall(
        &config_path,
        &["retrieve", "incident", "--title", "Database down", "--json"],
    );
    assert!(!success);
    assert!(stderr.contains("embedding provider"), "got: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env("hnsw");

    let (_, stderr, success) = run_recall(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("parse"), "got: {}", stderr);
}
