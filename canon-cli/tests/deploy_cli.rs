use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn canon_cmd(home: &Path, project: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("canon"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .current_dir(project);
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run canon");
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn rules(project: &TempDir) -> std::path::PathBuf {
    project.path().join(".cursor").join("rules")
}

#[test]
fn deploy_then_redeploy_is_up_to_date() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");

    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success()
        .stdout(contains("deployment #1"))
        .stdout(contains("testing.mdc"));
    assert!(rules(&project).join("security.mdc").is_file());
    assert!(project.path().join(".canon").join("history.db").is_file());

    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success()
        .stdout(contains("already up to date"));
}

#[test]
fn hand_edit_blocks_deploy_with_exit_code_two() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success();

    let edited = "# my own testing rules\n";
    fs::write(rules(&project).join("testing.mdc"), edited).expect("edit");

    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .code(2)
        .stdout(contains("testing.mdc"))
        .stdout(contains("--force"));
    assert_eq!(
        fs::read_to_string(rules(&project).join("testing.mdc")).unwrap(),
        edited
    );

    canon_cmd(home.path(), project.path())
        .args(["deploy", "--force"])
        .assert()
        .success()
        .stdout(contains("backup:"));
    assert_ne!(
        fs::read_to_string(rules(&project).join("testing.mdc")).unwrap(),
        edited
    );

    let snapshots: Vec<_> = fs::read_dir(rules(&project).join("backups"))
        .expect("backups dir")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        fs::read_to_string(snapshots[0].join("testing.mdc")).unwrap(),
        edited
    );
}

#[test]
fn drift_json_reports_files_and_last_deployment() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .args(["deploy", "--by", "ana"])
        .assert()
        .success();
    fs::write(rules(&project).join("security.mdc"), "edited").expect("edit");

    let report = json_stdout(canon_cmd(home.path(), project.path()).args(["deploy", "--json"]));
    assert_eq!(report["mode"], "applied");
    assert_eq!(report["result"]["outcome"], "drift_warning");
    assert_eq!(report["result"]["files"], serde_json::json!(["security.mdc"]));
    assert_eq!(report["result"]["last_deployment"]["deployed_by"], "ana");
}

#[test]
fn dry_run_and_status_leave_project_untouched() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");

    let report = json_stdout(
        canon_cmd(home.path(), project.path()).args(["deploy", "--dry-run", "--json"]),
    );
    assert_eq!(report["mode"], "planned");
    assert_eq!(report["result"]["decision"]["reason"], "empty_target");

    let status = json_stdout(canon_cmd(home.path(), project.path()).args(["status", "--json"]));
    assert_eq!(status["decision"]["action"], "write");
    assert!(status["last_deployment"].is_null());

    assert!(!project.path().join(".cursor").exists());
    assert!(!project.path().join(".canon").exists());
}

#[test]
fn status_table_marks_edited_file() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success();
    fs::write(rules(&project).join("git-workflow.mdc"), "edited").expect("edit");

    canon_cmd(home.path(), project.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("EDITED"))
        .stdout(contains("CURRENT"))
        .stdout(contains("blocked"));
}

#[test]
fn diff_shows_hand_edit() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success();

    canon_cmd(home.path(), project.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("No differences"));

    let path = rules(&project).join("documentation.mdc");
    let edited = format!("{}local-sentinel-line\n", fs::read_to_string(&path).unwrap());
    fs::write(&path, edited).expect("edit");

    let assert = canon_cmd(home.path(), project.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("--- a/documentation.mdc"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert!(stdout
        .lines()
        .any(|line| line.starts_with('-') && line.contains("local-sentinel-line")));
}

#[test]
fn history_lists_deployments_newest_first() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success();
    canon_cmd(home.path(), project.path())
        .args(["deploy", "--force", "--no-backup"])
        .assert()
        .success();

    let entries = json_stdout(
        canon_cmd(home.path(), project.path()).args(["history", "--files", "--json"]),
    );
    let entries = entries.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"], 2);
    assert_eq!(entries[1]["id"], 1);
    assert!(entries[0].get("backup_path").is_none());
    let files = entries[0]["files"].as_array().expect("files");
    assert_eq!(files.len() as u64, entries[0]["file_count"].as_u64().unwrap());

    canon_cmd(home.path(), project.path())
        .args(["history", "--limit", "1"])
        .assert()
        .success()
        .stdout(contains("#2"))
        .stdout(contains("#1").not());
}

#[test]
fn config_defaults_apply_to_deploy() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");

    canon_cmd(home.path(), project.path())
        .args(["config", "set", "deployed_by", "release-bot"])
        .assert()
        .success();
    canon_cmd(home.path(), project.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("release-bot"));

    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success();
    let entries = json_stdout(canon_cmd(home.path(), project.path()).args(["history", "--json"]));
    assert_eq!(entries[0]["deployed_by"], "release-bot");
}

#[test]
fn unknown_config_key_fails() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure()
        .stderr(contains("unknown config key"));
}

#[test]
fn request_command_answers_in_json_envelope() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    let raw = serde_json::json!({
        "op": "deploy",
        "args": {"path": project.path(), "deployed_by": "agent"}
    })
    .to_string();

    let response = json_stdout(canon_cmd(home.path(), project.path()).args(["request", &raw]));
    assert_eq!(response["ok"], true);
    assert_eq!(response["data"]["result"]["outcome"], "deployed");

    canon_cmd(home.path(), project.path())
        .args(["request", r#"{"op":"deploy","args":{"path":".","force":true}}"#])
        .assert()
        .failure()
        .stdout(contains("\"ok\":false"))
        .stdout(contains("unknown field"));
}

#[test]
fn request_deploy_uses_config_defaults() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .args(["config", "set", "deployed_by", "release-bot"])
        .assert()
        .success();

    let raw = serde_json::json!({"op": "deploy", "args": {"path": project.path()}}).to_string();
    let response = json_stdout(canon_cmd(home.path(), project.path()).args(["request", &raw]));
    assert_eq!(response["ok"], true);

    let entries = json_stdout(canon_cmd(home.path(), project.path()).args(["history", "--json"]));
    assert_eq!(entries[0]["deployed_by"], "release-bot");
}

#[test]
fn diff_shows_line_ending_change_that_blocks_deploy() {
    let home = TempDir::new().expect("home");
    let project = TempDir::new().expect("project");
    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .success();

    let path = rules(&project).join("testing.mdc");
    let crlf = fs::read_to_string(&path).unwrap().replace('\n', "\r\n");
    fs::write(&path, crlf).expect("rewrite");

    canon_cmd(home.path(), project.path())
        .arg("deploy")
        .assert()
        .code(2);
    canon_cmd(home.path(), project.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("--- a/testing.mdc"))
        .stdout(contains("No differences").not());
}
