mod common;
use common::TestEnv;
use predicates::prelude::*;
use serde_json::{json, Value};

#[tokio::test]
async fn test_help_lists_commands() {
    let env = TestEnv::new().await;
    env.sp_audit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit a single block"))
        .stdout(predicate::str::contains("capture"));
}

#[tokio::test]
async fn test_block_audit_prints_and_exports() {
    let env = TestEnv::new().await;
    TestEnv::serve(&env.indexer_a, 840000, json!(["02aa", "02bb", "02cc"])).await;
    TestEnv::serve(&env.indexer_b, 840000, json!({"tweaks": ["02aa", "02bb"]})).await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["block", "840000", "-o", "out.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit Results for Block 840000"))
        .stdout(predicate::str::contains("66.7%"));

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(env.path("out.json")).unwrap()).unwrap();
    assert_eq!(exported["block_height"], 840000);
    assert_eq!(exported["tweak_counts"]["indexer-a"], 3);
    assert_eq!(exported["pairwise_comparisons"][0]["match_percentage"], 66.7);
    assert!(exported.get("details").is_none());
}

#[tokio::test]
async fn test_detailed_block_lists_unique_tweaks() {
    let env = TestEnv::new().await;
    TestEnv::serve(&env.indexer_a, 7, json!(["02aa", "02bb"])).await;
    TestEnv::serve(&env.indexer_b, 7, json!(["02aa"])).await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["audit-block", "7", "--detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("indexer-a unique tweaks"))
        .stdout(predicate::str::contains("02bb"));
}

#[tokio::test]
async fn test_failed_backend_is_reported_not_fatal() {
    let env = TestEnv::new().await;
    TestEnv::serve(&env.indexer_a, 9, json!(["02aa"])).await;
    TestEnv::fail(&env.indexer_b, 9, 401).await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["block", "9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed backends"))
        .stdout(predicate::str::contains("AuthError"))
        .stdout(predicate::str::contains("Skipping pair 'a-vs-b'"));
}

#[tokio::test]
async fn test_range_audit_summary() {
    let env = TestEnv::new().await;
    for h in 100..=102 {
        TestEnv::serve(&env.indexer_a, h, json!(["02aa", "02bb"])).await;
        TestEnv::serve(&env.indexer_b, h, json!(["02aa", "02bb"])).await;
    }
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["range", "100", "102", "--output", "range.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Range Audit Results (Blocks 100-102)"))
        .stdout(predicate::str::contains("100.0%"));

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(env.path("range.json")).unwrap()).unwrap();
    assert_eq!(exported["blocks_audited"], 3);
    assert_eq!(exported["pair_summaries"][0]["matching_count"], 6);
    assert_eq!(exported["stopped_early"], false);
}

#[tokio::test]
async fn test_detailed_range_lists_block_warnings() {
    let env = TestEnv::new().await;
    for h in 200..=201 {
        TestEnv::serve(&env.indexer_a, h, json!(["02aa"])).await;
    }
    TestEnv::serve(&env.indexer_b, 200, json!(["02aa"])).await;
    TestEnv::fail(&env.indexer_b, 201, 503).await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["range", "200", "201"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 warnings across the range (use -d to list them)"));

    env.sp_audit()
        .args(["range", "200", "201", "-d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Block 201:"))
        .stdout(predicate::str::contains("Skipping pair 'a-vs-b': 'indexer-b' failed at height 201"))
        .stdout(predicate::str::contains("warnings across the range").not());
}

#[tokio::test]
async fn test_inverted_range_rejected() {
    let env = TestEnv::new().await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["range", "10", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Start block 10 is after end block 5"));
}

#[tokio::test]
async fn test_missing_config_fails() {
    let env = TestEnv::new().await;
    env.sp_audit()
        .args(["block", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.json"));
}

#[tokio::test]
async fn test_export_error_exits_nonzero_after_report() {
    let env = TestEnv::new().await;
    TestEnv::serve(&env.indexer_a, 3, json!([])).await;
    TestEnv::serve(&env.indexer_b, 3, json!([])).await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["block", "3", "-o", "missing-dir/out.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Audit Results for Block 3"))
        .stderr(predicate::str::contains("Export error"));
}

#[tokio::test]
async fn test_capture_then_reference_pair() {
    let env = TestEnv::new().await;
    TestEnv::serve(&env.indexer_a, 500, json!(["02aa", "02bb"])).await;
    TestEnv::serve(&env.indexer_b, 500, json!(["02aa"])).await;

    let mut config = env.default_config();
    env.write_config(&config);
    env.sp_audit()
        .args(["capture", "indexer-a", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All blocks captured"));
    assert!(env.path("reference").join("mainnet").join("block_500.json").exists());

    config["pairs"] = json!([
        {"name": "b-vs-ref", "backend1": "indexer-b", "backend2": "reference"}
    ]);
    env.write_config(&config);
    env.sp_audit()
        .args(["block", "500", "-o", "ref.json"])
        .assert()
        .success();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(env.path("ref.json")).unwrap()).unwrap();
    let cmp = &exported["pairwise_comparisons"][0];
    assert_eq!(cmp["backend2"], "reference");
    assert_eq!(cmp["unique2"], 1);
    assert_eq!(cmp["match_percentage"], 50.0);
}

#[tokio::test]
async fn test_capture_from_reference_rejected() {
    let env = TestEnv::new().await;
    env.write_config(&env.default_config());

    env.sp_audit()
        .args(["capture", "reference", "1", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Capture failed"));
}
