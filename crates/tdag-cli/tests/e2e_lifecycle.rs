//! E2E CLI tests covering the single-task lifecycle:
//! - `td add` / `td show` / `td list` with JSON output
//! - status transitions (`td start`, `td done`, `td status`)
//! - `td request` with request age
//! - soft and hard removal
//! - configuration errors and the SQLite backend
//!
//! Each test runs `td` as a subprocess against an isolated `TDAG_HOME`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the `td` binary with `home` as its data home.
fn td_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("td"));
    cmd.current_dir(home);
    cmd.env("TDAG_HOME", home);
    cmd.env("TDAG_USER", "tester");
    cmd.env("TDAG_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd.env_remove("TDAG_DATA_PATH");
    cmd.env_remove("TDAG_PROFILE");
    cmd
}

/// Run with `--json` and parse stdout, asserting success.
fn td_json(home: &Path, args: &[&str]) -> Value {
    let output = td_cmd(home)
        .args(args)
        .arg("--json")
        .output()
        .expect("td should not crash");
    assert!(
        output.status.success(),
        "td {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Run with `--json`, assert failure, and parse the error object on stderr.
fn td_json_err(home: &Path, args: &[&str]) -> Value {
    let output = td_cmd(home)
        .args(args)
        .arg("--json")
        .output()
        .expect("td should not crash");
    assert!(!output.status.success(), "td {args:?} unexpectedly succeeded");
    let json: Value =
        serde_json::from_slice(&output.stderr).expect("errors should be JSON in --json mode");
    json["error"].clone()
}

fn add(home: &Path, title: &str, extra: &[&str]) -> String {
    let mut args = vec!["add", title];
    args.extend_from_slice(extra);
    let json = td_json(home, &args);
    json["id"].as_str().expect("add output should have an id").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn add_show_list_done_roundtrip() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();

    let id = add(home, "Write docs", &["-p", "3", "--tag", "docs"]);
    assert!(id.ends_with("_tester"), "id should carry the actor: {id}");

    let shown = td_json(home, &["show", &id]);
    assert_eq!(shown["title"], "Write docs");
    assert_eq!(shown["priority"], 3);
    assert_eq!(shown["status"], "pending");
    assert_eq!(shown["tags"], serde_json::json!(["docs"]));

    let listed = td_json(home, &["list"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    td_json(home, &["start", &id]);
    assert_eq!(td_json(home, &["show", &id])["status"], "in_progress");

    let change = td_json(home, &["done", &id]);
    assert_eq!(change["from"], "in_progress");
    assert_eq!(change["to"], "done");

    let pending = td_json(home, &["list", "--status", "pending"]);
    assert!(pending.as_array().unwrap().is_empty());
}

#[test]
fn text_output_prints_bare_ids() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();

    td_cmd(home)
        .args(["add", "Plain", "--id", "plain-1", "--format", "text"])
        .assert()
        .success()
        .stdout("plain-1\n");

    td_cmd(home)
        .args(["list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plain-1").and(predicate::str::contains("Plain")));
}

#[test]
fn show_accepts_unique_prefix_and_reports_unknown_ids() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    add(home, "Only", &["--id", "alpha-123"]);

    assert_eq!(td_json(home, &["show", "alpha"])["id"], "alpha-123");

    let err = td_json_err(home, &["show", "zzz"]);
    assert_eq!(err["error_code"], "E2001");
}

#[test]
fn update_changes_fields_and_rejects_empty_updates() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    let id = add(home, "Draft", &["--due", "2030-01-01"]);

    let updated = td_json(home, &["update", &id, "--title", "Final", "--clear-due", "-p", "-1"]);
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["priority"], -1);
    assert!(updated["due_date"].is_null());

    let err = td_json_err(home, &["update", &id]);
    assert!(err["message"].as_str().unwrap().contains("nothing to update"));
}

#[test]
fn request_assigns_and_reports_age() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    let id = add(home, "Review PR", &[]);

    let requested = td_json(
        home,
        &["request", &id, "--to", "sam", "--note", "please look", "--due", "2999-01-01"],
    );
    assert_eq!(requested["status"], "requested");
    assert_eq!(requested["assigned_to"], "sam");
    assert_eq!(requested["requested_by"], "tester");
    assert!(requested["requested_at"].is_string());
    assert!(requested["request_age"]["elapsed_secs"].as_i64().unwrap() >= 0);
    assert!(requested["request_age"]["remaining_secs"].as_i64().unwrap() > 0);

    let listed = td_json(home, &["list", "--requested"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[test]
fn soft_remove_hides_and_hard_remove_deletes() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    let soft = add(home, "Soft", &[]);
    let hard = add(home, "Hard", &[]);

    td_json(home, &["rm", &soft]);
    assert_eq!(td_json(home, &["show", &soft])["status"], "removed");
    let visible = td_json(home, &["list"]);
    assert_eq!(visible.as_array().unwrap().len(), 1);
    let all = td_json(home, &["list", "--include-removed"]);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let removed = td_json(home, &["rm", &hard, "--hard"]);
    assert_eq!(removed["hard"], true);
    assert_eq!(td_json_err(home, &["show", &hard])["error_code"], "E2001");
}

#[test]
fn invalid_title_is_rejected_with_validation_code() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    let long = "x".repeat(201);
    let err = td_json_err(home, &["add", &long]);
    assert_eq!(err["error_code"], "E2006");
}

#[test]
fn sqlite_backend_is_picked_by_extension() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    let db = home.join("tasks.db");
    let db = db.to_str().unwrap();

    let output = td_cmd(home)
        .args(["--data", db, "add", "Stored in sqlite", "--id", "sq-1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(home.join("tasks.db").exists());
    assert!(!home.join("tasks.yaml").exists());

    let shown = td_json(home, &["--data", db, "show", "sq-1"]);
    assert_eq!(shown["title"], "Stored in sqlite");
}

#[test]
fn unsupported_extension_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    let err = td_json_err(home, &["--data", "tasks.csv", "list"]);
    assert_eq!(err["error_code"], "E1001");
}

#[test]
fn config_file_sets_user_and_profile() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    std::fs::write(home.join("config.toml"), "user = \"robin\"\nprofile = \"work\"\n").unwrap();

    let output = td_cmd(home)
        .env_remove("TDAG_USER")
        .env_remove("USER")
        .args(["add", "From config", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = json["id"].as_str().unwrap();
    assert!(id.ends_with("_robin"), "{id}");
    assert!(home.join("work").join("tasks.yaml").exists());
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = TempDir::new().unwrap();
    let home = dir.path();
    std::fs::write(home.join("config.toml"), "colour = \"blue\"\n").unwrap();

    td_cmd(home)
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}
