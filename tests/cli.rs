mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kba_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kba");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let uploads = root.join("uploads");
    fs::create_dir_all(&uploads).unwrap();
    fs::write(
        uploads.join("handbook.docx"),
        common::minimal_docx(&[
            "Employees receive twenty vacation days per year.",
            "Vacation requests go to your manager.",
        ]),
    )
    .unwrap();
    fs::write(
        uploads.join("infra.docx"),
        common::minimal_docx(&["Deployments run on Kubernetes clusters every Tuesday."]),
    )
    .unwrap();
    fs::write(uploads.join("notes.txt"), "not a supported format").unwrap();

    let config_content = format!(
        r#"[storage]
dir = "{root}/data"
upload_dir = "{root}/uploads"

[chunking]
chunk_size = 400
overlap = 50

[embedding]
provider = "hashing"

[chat]
use_llm = false

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("kba.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kba(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kba_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("KA_LLM_ENDPOINT")
        .env_remove("KA_DATA_DIR")
        .env_remove("KA_UPLOAD_DIR")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kba binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_scan_then_list() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_kba(&config, &["scan"]);
    assert!(ok, "scan failed: {}", stderr);
    assert!(stdout.contains("processed: 2"), "stdout: {}", stdout);

    let (stdout, _, ok) = run_kba(&config, &["list"]);
    assert!(ok);
    assert!(stdout.contains("handbook.docx"));
    assert!(stdout.contains("infra.docx"));
    assert!(!stdout.contains("notes.txt"));
}

#[test]
fn test_rescan_skips_stored_documents() {
    let (_tmp, config) = setup_test_env();
    run_kba(&config, &["scan"]);

    let (stdout, _, ok) = run_kba(&config, &["scan"]);
    assert!(ok);
    assert!(stdout.contains("processed: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped:   2"), "stdout: {}", stdout);
}

#[test]
fn test_search_ranks_matching_document_first() {
    let (_tmp, config) = setup_test_env();
    run_kba(&config, &["scan"]);

    let (stdout, _, ok) = run_kba(&config, &["search", "vacation days", "-k", "1"]);
    assert!(ok);
    assert!(stdout.starts_with("1. ["), "stdout: {}", stdout);
    assert!(stdout.contains("handbook.docx"));
    assert!(!stdout.contains("infra.docx"));
}

#[test]
fn test_search_empty_store() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_kba(&config, &["search", "anything"]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_ask_without_llm_uses_document_text() {
    let (_tmp, config) = setup_test_env();
    run_kba(&config, &["scan"]);

    let (stdout, stderr, ok) = run_kba(&config, &["ask", "vacation", "--no-llm"]);
    assert!(ok, "ask failed: {}", stderr);
    assert!(stdout.contains("Based on the uploaded documents"));
    assert!(stdout.contains("twenty vacation days"));
    assert!(stdout.contains("Sources: handbook.docx"));
}

#[test]
fn test_remove_and_clear() {
    let (_tmp, config) = setup_test_env();
    run_kba(&config, &["scan"]);

    let (stdout, _, ok) = run_kba(&config, &["remove", "infra.docx"]);
    assert!(ok);
    assert!(stdout.contains("removed 1 chunks"));

    let (stdout, _, ok) = run_kba(&config, &["remove", "infra.docx"]);
    assert!(ok);
    assert!(stdout.contains("not stored"));

    let (stdout, _, _) = run_kba(&config, &["info"]);
    assert!(stdout.contains("Documents:   1"), "stdout: {}", stdout);

    let (_, _, ok) = run_kba(&config, &["clear"]);
    assert!(ok);
    let (stdout, _, _) = run_kba(&config, &["list"]);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_ingest_reports_failures() {
    let (tmp, config) = setup_test_env();
    let bad = tmp.path().join("uploads").join("notes.txt");
    let good = tmp.path().join("uploads").join("infra.docx");

    let (stdout, stderr, ok) = run_kba(
        &config,
        &["ingest", good.to_str().unwrap(), bad.to_str().unwrap()],
    );
    assert!(!ok);
    assert!(stdout.contains("infra.docx: 1 chunks"));
    assert!(stderr.contains("unsupported file format"));
}

#[test]
fn test_stats_prints_json() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("uploads").join("handbook.docx");
    let (stdout, _, ok) = run_kba(&config, &["stats", file.to_str().unwrap()]);
    assert!(ok);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["file_name"], "handbook.docx");
    assert_eq!(stats["chunk_count"], 1);
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[chunking]\nchunk_size = 10\noverlap = 10\n").unwrap();
    let (_, stderr, ok) = run_kba(&config, &["list"]);
    assert!(!ok);
    assert!(stderr.contains("overlap"));
}

#[test]
fn test_completions() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_kba(&config, &["completions", "bash"]);
    assert!(ok);
    assert!(stdout.contains("kba"));
}
