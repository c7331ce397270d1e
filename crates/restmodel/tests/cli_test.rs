//! Integration tests for the `restmodel` CLI binary.
//!
//! Argument parsing, config inspection and previews run offline; the
//! `act` tests point the binary at a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `restmodel` binary with env isolation.
///
/// Clears the `RESTMODEL_*` variables the CLI reads and points config
/// directories at a nonexistent path so tests never touch the user's
/// real configuration.
fn restmodel_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("restmodel");
    cmd.env("HOME", "/tmp/restmodel-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/restmodel-cli-test-nonexistent")
        .env_remove("RESTMODEL_CONFIG")
        .env_remove("RESTMODEL_BASE_URL")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const CONFIG: &str = r#"
[defaults]
base_url = "http://127.0.0.1:1/api"
bearer_token = "s3cret"
content_type = "application/json"
take_at_least_ms = 0

[models.users]
base_route = "/users"
exclude_keys = ["team"]

[models.users.actions.activate]
method = "patch"
route = "/{id}/activate"
only = ["id"]

[models.users.actions]
destroy = false

[models.posts]
base_route = "/posts"
"#;

struct Fixture {
    _dir: TempDir,
    config: PathBuf,
    record: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, CONFIG).unwrap();
    let record = dir.path().join("user.json");
    std::fs::write(
        &record,
        json!({ "id": 7, "name": "Ada", "password": "x", "team": { "id": 1 } }).to_string(),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        config,
        record,
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn path_arg(p: &Path) -> &str {
    p.to_str().unwrap()
}

/// Run the command off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = restmodel_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    restmodel_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("act")
            .and(predicate::str::contains("preview"))
            .and(predicate::str::contains("models"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    restmodel_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("restmodel"));
}

#[test]
fn test_invalid_subcommand() {
    let output = restmodel_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    restmodel_cmd()
        .args(["--config", "/tmp/elsewhere/restmodel.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/restmodel.toml"));
}

#[test]
fn test_config_path_defaults_to_config_toml() {
    restmodel_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_token() {
    let fx = fixture();
    restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[models.users]")
                .and(predicate::str::contains("s3cret").not()),
        );
}

#[test]
fn test_config_show_without_file_succeeds() {
    restmodel_cmd().args(["config", "show"]).assert().success();
}

// ── Models & preview ────────────────────────────────────────────────

#[test]
fn test_models_lists_types_and_actions() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "models"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let models = stdout_json(&output);
    assert_eq!(models["users"]["base_route"], "/users");
    let actions: Vec<&str> = models["users"]["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap())
        .collect();
    assert!(actions.contains(&"activate"));
    assert!(!actions.contains(&"destroy"));
    assert!(models.get("posts").is_some());
}

#[test]
fn test_preview_shows_route_and_payload() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "preview", "users", "update"])
        .args(["--record", path_arg(&fx.record), "--without", "password"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let preview = stdout_json(&output);
    assert_eq!(preview["method"], "PUT");
    assert_eq!(preview["route"], "/users/7");
    assert_eq!(preview["content_type"], "application/json");
    assert_eq!(preview["payload"], json!({ "id": 7, "name": "Ada" }));
}

#[test]
fn test_preview_reads_record_from_stdin() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "preview", "users", "activate"])
        .args(["--record", "-", "--with", r#"{"reason":"manual"}"#])
        .write_stdin(r#"{"id": 3, "name": "Grace"}"#)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let preview = stdout_json(&output);
    assert_eq!(preview["method"], "PATCH");
    assert_eq!(preview["route"], "/users/3/activate");
    assert_eq!(preview["payload"], json!({ "id": 3, "reason": "manual" }));
}

#[test]
fn test_preview_unknown_model() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "preview", "invoices", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("invoices"));
}

#[test]
fn test_disabled_action_is_unknown() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "preview", "users", "destroy"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("destroy"));
}

#[test]
fn test_with_must_be_an_object() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "preview", "users", "update"])
        .args(["--with", "[1, 2]"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--with"));
}

#[test]
fn test_record_must_be_an_object() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "preview", "users", "update"])
        .args(["--record", "-"])
        .write_stdin("[1, 2]")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Act ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_act_applies_the_response() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/users/7"))
        .and(body_json(json!({ "id": 7, "name": "Ada", "password": "x" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "id": 7, "name": "Ada", "active": true } })),
        )
        .mount(&server)
        .await;

    let fx = fixture();
    let mut cmd = restmodel_cmd();
    cmd.args(["--config", path_arg(&fx.config)])
        .args(["--base-url", &format!("{}/api", server.uri())])
        .args(["act", "users", "update", "--record", path_arg(&fx.record)]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let report = stdout_json(&output);
    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["record"]["active"], true);
    let names: Vec<&str> = report["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["users.update.before", "users.update.success", "users.update.complete"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_act_reports_validation_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": { "title": ["can't be blank"] }
        })))
        .mount(&server)
        .await;

    let fx = fixture();
    let mut cmd = restmodel_cmd();
    cmd.args(["--config", path_arg(&fx.config)])
        .args(["--base-url", &format!("{}/api", server.uri())])
        .args(["act", "posts", "create", "--record", "-"])
        .write_stdin(r#"{"title": ""}"#);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(5), "{}", combined_output(&output));
    let report = stdout_json(&output);
    assert_eq!(report["outcome"], "failed");
    assert_eq!(report["errors"], json!({ "title": ["can't be blank"] }));
    assert!(String::from_utf8_lossy(&output.stderr).contains("can't be blank"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_act_method_and_route_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/7/reset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let fx = fixture();
    let mut cmd = restmodel_cmd();
    cmd.args(["--config", path_arg(&fx.config)])
        .args(["--base-url", &format!("{}/api", server.uri())])
        .args(["-o", "json-compact", "act", "users", "fetch"])
        .args(["--record", path_arg(&fx.record), "-X", "post", "--route", "/{id}/reset"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let report = stdout_json(&output);
    assert_eq!(report["response"], json!({ "ok": true }));
}

#[test]
fn test_act_connection_refused() {
    let fx = fixture();
    let output = restmodel_cmd()
        .args(["--config", path_arg(&fx.config), "act", "users", "fetch"])
        .args(["--record", path_arg(&fx.record)])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(2), "{}", combined_output(&output));
}
