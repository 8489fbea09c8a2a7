#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

fn dockdev(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("dockdev").unwrap();
    cmd.current_dir(project.path()).env_remove("DOCKDEV_CONFIG");
    cmd
}

/// ヘルプに全オプションが表示されることを確認
#[test]
fn test_cli_help() {
    let project = TestProject::new();
    dockdev(&project)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(":local"))
        .stdout(predicate::str::contains("--local"))
        .stdout(predicate::str::contains("--branch"))
        .stdout(predicate::str::contains("--retag"))
        .stdout(predicate::str::contains("--only"))
        .stdout(predicate::str::contains("--default"))
        .stdout(predicate::str::contains("--checkout"))
        .stdout(predicate::str::contains("--adhoc"));
}

#[test]
fn test_cli_version() {
    let project = TestProject::new();
    dockdev(&project)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dockdev"));
}

/// カレントディレクトリに config.json が無ければエラー終了する
#[test]
fn test_missing_config() {
    let project = TestProject::new();
    dockdev(&project)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("ERROR: "))
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_config_from_env_var() {
    let project = TestProject::new();
    let other = TestProject::new();
    let path = other.path().join("elsewhere.json");

    dockdev(&project)
        .env("DOCKDEV_CONFIG", &path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("elsewhere.json"));
}

#[test]
fn test_config_without_services() {
    let project = TestProject::new();
    project.write_config(r#"{ "template": { "git_repo": "{name}.git" } }"#);

    dockdev(&project)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ERROR: config has no \"services\" section"));
}

#[test]
fn test_malformed_config() {
    let project = TestProject::new();
    let path = project.write_config("{ not json");

    dockdev(&project)
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR: failed to parse config"));
}

#[test]
fn test_branch_needs_app_list() {
    let project = TestProject::new();
    dockdev(&project)
        .args(["-b", "feature"])
        .assert()
        .failure()
        .code(2);
}
