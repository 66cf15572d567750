#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two mock REST indexers plus a scratch directory for config and output.
pub struct TestEnv {
    pub indexer_a: MockServer,
    pub indexer_b: MockServer,
    pub work_dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self {
            indexer_a: MockServer::start().await,
            indexer_b: MockServer::start().await,
            work_dir: TempDir::new().unwrap(),
        }
    }

    pub fn sp_audit(&self) -> Command {
        let mut cmd = Command::cargo_bin("sp-audit").unwrap();
        cmd.current_dir(self.work_dir.path());
        cmd.env_remove("SP_AUDIT_CONFIG");
        cmd.env_remove("RUST_LOG");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work_dir.path().join(name)
    }

    /// Config with both indexers and one pair between them.
    pub fn default_config(&self) -> Value {
        json!({
            "backends": [
                self.backend("indexer-a", &self.indexer_a),
                self.backend("indexer-b", &self.indexer_b),
            ],
            "pairs": [
                {"name": "a-vs-b", "backend1": "indexer-a", "backend2": "indexer-b"}
            ],
            "reference_dir": self.path("reference").to_string_lossy(),
        })
    }

    pub fn backend(&self, name: &str, server: &MockServer) -> Value {
        json!({
            "name": name,
            "protocol": "http",
            "endpoint": format!("{}/tweaks/{{height}}", server.uri()),
            "timeout": 5,
        })
    }

    /// Write `config` to `config.json` in the work dir.
    pub fn write_config(&self, config: &Value) -> PathBuf {
        let path = self.path("config.json");
        std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
        path
    }

    pub async fn serve(server: &MockServer, height: u64, tweaks: Value) {
        Mock::given(path(format!("/tweaks/{}", height)))
            .respond_with(ResponseTemplate::new(200).set_body_json(tweaks))
            .mount(server)
            .await;
    }

    pub async fn fail(server: &MockServer, height: u64, status: u16) {
        Mock::given(path(format!("/tweaks/{}", height)))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }
}
