//! Full daemon integration smoke test: build a real `Daemon` over a
//! temporary store/media root, bind it to an ephemeral port, and drive the
//! HTTP surface with `reqwest` exactly as an external client would.
//! Grounded on `at-daemon`'s `integration_test.rs` (`start_test_server`
//! pattern: bind to port 0, spawn `axum::serve`, return the base URL).

mod support;

use serde_json::json;
use support::spawn_daemon;

#[tokio::test]
async fn healthz_is_unauthenticated_and_ok() {
    let (base_url, _cred) = spawn_daemon().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base_url}/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn submit_without_credential_is_unauthorized() {
    let (base_url, _cred) = spawn_daemon().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base_url}/api/v1/analyze/"))
        .json(&json!({"purl": "pkg:pypi/django@1.11.1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_queues_and_status_reports_it() {
    let (base_url, cred) = spawn_daemon().await;
    let client = reqwest::Client::new();

    let submit: serde_json::Value = client
        .post(format!("{base_url}/api/v1/analyze/"))
        .header("X-API-Key", &cred)
        .json(&json!({"purl": "pkg:pypi/django@1.11.1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(submit["success"].as_bool().unwrap());
    let task_id = submit["data"]["task_id"].as_str().unwrap().to_string();

    let status: serde_json::Value = client
        .get(format!("{base_url}/api/v1/task/{task_id}/"))
        .header("X-API-Key", &cred)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let reported_status = status["data"]["status"].as_str().unwrap();
    assert!(
        reported_status == "queued" || reported_status == "running",
        "unexpected status: {reported_status}"
    );
}

#[tokio::test]
async fn duplicate_submission_returns_same_task_id() {
    let (base_url, cred) = spawn_daemon().await;
    let client = reqwest::Client::new();

    let first: serde_json::Value = client
        .post(format!("{base_url}/api/v1/analyze/"))
        .header("X-API-Key", &cred)
        .json(&json!({"purl": "pkg:npm/left-pad@1.3.0"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let second: serde_json::Value = client
        .post(format!("{base_url}/api/v1/analyze/"))
        .header("X-API-Key", &cred)
        .json(&json!({"purl": "pkg:npm/left-pad@1.3.0"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(first["data"]["task_id"], second["data"]["task_id"]);
}

#[tokio::test]
async fn queue_status_exposes_counts() {
    let (base_url, cred) = spawn_daemon().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base_url}/api/v1/analyze/"))
        .header("X-API-Key", &cred)
        .json(&json!({"purl": "pkg:pypi/requests@2.28.1"}))
        .send()
        .await
        .unwrap();

    let status: serde_json::Value = client
        .get(format!("{base_url}/api/v1/queue/status/"))
        .header("X-API-Key", &cred)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(status["data"]["queued_count"].as_u64().unwrap() + status["data"]["running_count"].as_u64().unwrap() >= 1);
}
