//! CLI integration tests.
//!
//! Each test runs the `evsync` binary with its settings, database and assets
//! under a temp directory. Stdout is not a terminal here, so every command
//! answers in JSON.

use assert_cmd::Command;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn db(&self) -> PathBuf {
        self.path("data/evsync.db")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("evsync").unwrap();
        cmd.env_remove("EVSYNC_API_KEY")
            .env_remove("EVSYNC_ORG")
            .env_remove("EVSYNC_API_BASE_URL")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.path("config.json"))
            .arg("--db")
            .arg(self.db())
            .arg("--assets")
            .arg(self.path("assets"));
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn run_json(cmd: &mut Command, args: &[&str]) -> Value {
    stdout_json(&cmd.args(args).output().unwrap())
}

#[test]
fn test_version_json() {
    let sandbox = Sandbox::new();
    let out = run_json(&mut sandbox.cmd(), &["version"]);
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(out["schema_version"], 1);
}

#[test]
fn test_config_set_then_show_masks_key() {
    let sandbox = Sandbox::new();
    run_json(
        &mut sandbox.cmd(),
        &["config", "set", "--api-key", "abcdef123456", "--org", "acme", "--post-tags", "events"],
    );

    let stored: Value =
        serde_json::from_str(&std::fs::read_to_string(sandbox.path("config.json")).unwrap()).unwrap();
    assert_eq!(stored["api_key"], "abcdef123456");

    let out = run_json(&mut sandbox.cmd(), &["config", "show"]);
    assert_eq!(out["settings"]["api_key"], "********3456");
    assert_eq!(out["settings"]["org"], "acme");
    assert_eq!(out["settings"]["post_tags"], "events");
    assert_eq!(out["settings"]["run_interval"], "daily");
}

#[test]
fn test_config_set_without_options_is_invalid() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().args(["config", "set"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_config_reset_keeps_credentials() {
    let sandbox = Sandbox::new();
    run_json(
        &mut sandbox.cmd(),
        &["config", "set", "--api-key", "k", "--org", "acme", "--run-interval", "hourly"],
    );
    run_json(&mut sandbox.cmd(), &["config", "reset", "--keep-credentials"]);

    let out = run_json(&mut sandbox.cmd(), &["config", "show"]);
    assert_eq!(out["settings"]["org"], "acme");
    assert_eq!(out["settings"]["run_interval"], "daily");
}

#[test]
fn test_sync_without_credentials_fails_before_creating_db() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().arg("sync").output().unwrap();

    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err: Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(err["error"]["code"], "CONFIG_ERROR");
    assert!(err["error"]["hint"].as_str().unwrap().contains("evsync config set"));
    assert!(!sandbox.db().exists());
}

#[test]
fn test_status_on_fresh_install() {
    let sandbox = Sandbox::new();
    let out = run_json(&mut sandbox.cmd(), &["status"]);
    assert_eq!(out["records"]["total"], 0);
    assert!(out["org"].is_null());
    assert!(out["last_run"].is_null());
    assert!(!sandbox.db().exists());
}

async fn mount_upstream(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "evt": [
                {
                    "eid": "e1",
                    "ttl": "Launch Party",
                    "str": "2025-03-01 10:00",
                    "sdp": 1_740_823_200,
                    "edp": 4_102_444_800_i64,
                    "loc": "Main Hall",
                    "url": "2025/3/1/launch",
                },
                {
                    "eid": "e2",
                    "ttl": "",
                    "str": "2025-03-02 10:00",
                    "sdp": 1_740_909_600,
                    "url": "2025/3/2/broken",
                },
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/event"))
        .and(query_param("url", "2025/3/1/launch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dtl": "<p>Bring friends.</p>",
            "lgo": {"s": format!("{}/logo.png", server.uri())},
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/event"))
        .and(query_param("url", "2025/3/2/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(&b"\x89PNG\r\n\x1a\n"[..], "image/png"))
        .mount(server)
        .await;
}

fn configure(sandbox: &Sandbox, api_base_url: &str) {
    run_json(
        &mut sandbox.cmd(),
        &[
            "config",
            "set",
            "--api-key",
            "key",
            "--org",
            "acme",
            "--api-base-url",
            api_base_url,
            "--events-base-url",
            "https://acme.test",
        ],
    );
}

fn has_files(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_end_to_end() {
    let server = MockServer::start().await;
    mount_upstream(&server).await;

    let sandbox = Sandbox::new();
    configure(&sandbox, &server.uri());

    let out = run_json(&mut sandbox.cmd(), &["sync"]);
    assert_eq!(out["org"], "acme");
    assert_eq!(out["report"]["fetched"], 2);
    assert_eq!(out["report"]["created"], 1);
    assert_eq!(out["report"]["errors"], 1);
    assert!(has_files(&sandbox.path("assets")));

    let out = run_json(&mut sandbox.cmd(), &["sync"]);
    assert_eq!(out["report"]["created"], 0);
    assert_eq!(out["report"]["unchanged"], 1);

    let out = run_json(&mut sandbox.cmd(), &["status", "--list"]);
    assert_eq!(out["records"]["active"], 1);
    assert_eq!(out["last_run"]["unchanged"], 1);
    assert!(out["lock"].is_null());
    assert_eq!(out["events"][0]["event_id"], "e1");
    assert_eq!(out["events"][0]["title"], "Launch Party");

    let out = run_json(&mut sandbox.cmd(), &["history", "e1"]);
    assert_eq!(out["status"], "active");
    let types: Vec<&str> = out["history"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["event_type"].as_str())
        .collect();
    assert!(types.contains(&"record_created"));
    assert!(types.contains(&"content_created"));
    assert!(types.contains(&"image_attached"));
}

#[test]
fn test_history_of_untracked_event() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().args(["history", "nope"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
}
