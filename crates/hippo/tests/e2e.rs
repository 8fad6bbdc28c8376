// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests that drive the `hippo` binary against a temp storage dir.

use std::path::Path;
use std::process::{Command, Output};

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("hippo.toml");
    let toml = format!(
        r#"
[agent]
log_level = "warn"

[brain]
storage_dir = "{}"

[embeddings]
mode = "static"

[provider]
base_url = "http://127.0.0.1:9/v1"
api_key = "sk-test"
"#,
        dir.join("store").display()
    );
    std::fs::write(&path, toml).unwrap();
    path
}

fn hippo(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hippo"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn init_prompts_creates_templates() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let out = hippo(&config, &["init-prompts"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.path().join("store/brain/extract.prompt").exists());

    let again = hippo(&config, &["init-prompts"]);
    assert!(String::from_utf8_lossy(&again.stdout).contains("up to date"));
}

#[test]
fn stats_json_reports_an_empty_brain() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let out = hippo(&config, &["stats", "--json"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stats: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(stats["facts"], 0);
    assert_eq!(stats["state"], "idle");
    assert!(dir.path().join("store/vector_db").is_dir());
}

#[test]
fn recall_on_empty_store_finds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let out = hippo(&config, &["recall", "coffee"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("no memories matched"));
}

#[test]
fn forget_unknown_id_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let out = hippo(&config, &["forget", "missing-id"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("no memory with id missing-id"));
}

#[test]
fn invalid_config_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hippo.toml");
    std::fs::write(&path, "[brain]\ninteraction_period = 0\n").unwrap();

    let out = hippo(&path, &["stats"]);
    assert!(!out.status.success());
}

#[test]
fn config_show_masks_the_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let out = hippo(&config, &["config", "show"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success());
    assert!(!stdout.contains("sk-test"));
    assert!(stdout.contains("storage_dir"));
}
