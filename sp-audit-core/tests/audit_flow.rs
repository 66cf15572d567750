//! Integration tests for the core audit flow: config file on disk, pair
//! resolution, result assembly and the serialized output shape.

use std::time::Duration;

use sp_audit_core::comparison::resolve_pairs;
use sp_audit_core::{
    AuditConfig, AuditResult, BackendFailure, BackendOutcome, FailureKind, FileReferenceStore,
    Network, RangeAuditResult, ReferenceStore, TweakRecord, TweakSet,
};
use tempfile::TempDir;

fn tweaks(height: u64, values: &[&str]) -> TweakSet {
    values
        .iter()
        .map(|v| TweakRecord::new(height, None, v).unwrap())
        .collect()
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_json_config_to_serialized_result() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "config.json",
        r#"{
            "services": [
                {"name": "core", "service_type": "rpc", "endpoint": "http://127.0.0.1:8332", "dust_limit": 546},
                {"name": "oracle", "service_type": "http", "endpoint": "http://127.0.0.1:8000"}
            ]
        }"#,
    );

    let config = AuditConfig::from_path(&path).unwrap();
    assert!(config.validate().is_empty());

    let resolution = resolve_pairs(&config).unwrap();
    assert_eq!(resolution.pairs.len(), 1);
    assert!(resolution.pairs[0].filter_warning.is_some());

    let ms = Duration::from_millis(3);
    let mut result = AuditResult::assemble(
        840_000,
        vec![
            BackendOutcome::success("core", 840_000, tweaks(840_000, &["02aa", "02bb", "02cc"]), ms),
            BackendOutcome::success("oracle", 840_000, tweaks(840_000, &["0x02AA", "02bb"]), ms),
        ],
        &resolution.pairs,
        Vec::new(),
    );
    result.strip_details();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["block_height"], 840_000);
    assert_eq!(json["tweak_counts"]["core"], 3);
    assert_eq!(json["matching_count"], 2);
    assert_eq!(json["non_matching_counts"]["core"], 1);
    assert_eq!(json["non_matching_counts"]["oracle"], 0);

    let cmp = &json["pairwise_comparisons"][0];
    assert_eq!(cmp["pair_name"], "core vs oracle");
    assert_eq!(cmp["unique1"], 1);
    assert_eq!(cmp["unique2"], 0);
    assert_eq!(cmp["match_percentage"], 66.7);
    assert!(cmp["filter_mismatch_warning"].is_string());
    assert!(json["failures"].as_object().unwrap().is_empty());
}

#[test]
fn test_toml_config_with_reference_pair() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "audit.toml",
        r#"
            network = "regtest"

            [[backends]]
            name = "electrs"
            protocol = "socket_rpc"
            endpoint = "127.0.0.1:50001"

            [[pairs]]
            name = "electrs-vs-reference"
            backend1 = "electrs"
            backend2 = "reference"
        "#,
    );

    let config = AuditConfig::from_path(&path).unwrap();
    assert_eq!(config.network, Network::Regtest);
    let resolution = resolve_pairs(&config).unwrap();
    assert!(resolution.needs_virtual_reference());
}

#[test]
fn test_unreadable_config_reports_path() {
    let err = AuditConfig::from_path("/nonexistent/config.json").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/config.json"));
}

#[test]
fn test_captured_reference_feeds_comparison() {
    let dir = TempDir::new().unwrap();
    let store = FileReferenceStore::new(dir.path());
    let captured = tweaks(10, &["02aa", "02bb"]);
    store.store(Network::Mainnet, 10, "core", &captured).unwrap();

    let config = AuditConfig::from_json_str(
        r#"{
            "backends": [{"name": "oracle", "protocol": "http", "endpoint": "http://x"}],
            "pairs": [{"name": "oracle-vs-ref", "backend1": "oracle", "backend2": "reference"}]
        }"#,
    )
    .unwrap();
    let resolution = resolve_pairs(&config).unwrap();

    let reference = store.load(Network::Mainnet, 10).unwrap().unwrap();
    let ms = Duration::from_millis(1);
    let result = AuditResult::assemble(
        10,
        vec![
            BackendOutcome::success("oracle", 10, tweaks(10, &["02aa"]), ms),
            BackendOutcome::success("reference", 10, reference, Duration::ZERO),
        ],
        &resolution.pairs,
        Vec::new(),
    );

    assert_eq!(result.pairwise_comparisons[0].matching_count, 1);
    assert_eq!(result.pairwise_comparisons[0].unique2, 1);
}

#[test]
fn test_range_result_serialization() {
    let config = AuditConfig::from_json_str(
        r#"{"backends": [
            {"name": "a", "protocol": "http", "endpoint": "http://a"},
            {"name": "b", "protocol": "http", "endpoint": "http://b"}
        ]}"#,
    )
    .unwrap();
    let pairs = resolve_pairs(&config).unwrap().pairs;
    let ms = Duration::from_millis(2);

    let mut range = RangeAuditResult::new(5, 6);
    range.fold(AuditResult::assemble(
        5,
        vec![
            BackendOutcome::success("a", 5, tweaks(5, &["01", "02"]), ms),
            BackendOutcome::success("b", 5, tweaks(5, &["01", "02"]), ms),
        ],
        &pairs,
        Vec::new(),
    ));
    range.fold(AuditResult::assemble(
        6,
        vec![
            BackendOutcome::success("a", 6, tweaks(6, &["03"]), ms),
            BackendOutcome::failure(
                "b",
                6,
                BackendFailure::new(FailureKind::UnsupportedHeightError, "beyond tip"),
                ms,
            ),
        ],
        &pairs,
        Vec::new(),
    ));
    range.strip_details();

    let json = serde_json::to_value(&range).unwrap();
    assert_eq!(json["start_block"], 5);
    assert_eq!(json["blocks_audited"], 2);
    assert_eq!(json["stopped_early"], false);
    assert_eq!(json["backend_summaries"]["a"]["total_tweaks"], 3);
    assert_eq!(json["backend_summaries"]["b"]["failures"], 1);
    assert_eq!(json["pair_summaries"][0]["blocks_compared"], 1);
    assert_eq!(json["pair_summaries"][0]["match_percentage"], 100.0);
    assert_eq!(
        json["block_results"][1]["failures"]["b"]["kind"],
        "UnsupportedHeightError"
    );
}
