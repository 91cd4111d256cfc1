//! Shared test harness: build a real `Daemon` over a temporary store and
//! media root, bind it to an ephemeral port, spawn it in the background,
//! and hand back a base URL plus a pre-provisioned API key.

use sbx_core::config::Config;
use sbx_core::types::Credential;
use sbx_daemon::daemon::Daemon;

/// Start a daemon on `127.0.0.1:0`, return its base URL and an active
/// credential's plaintext key.
pub async fn spawn_daemon() -> (String, String) {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.store.database_path = dir.path().join("tasks.db").to_string_lossy().into_owned();
    config.reports.media_root = dir.path().join("media").to_string_lossy().into_owned();
    config.sandbox.command = "sbx-test-sandbox-does-not-exist".into();

    let daemon = Daemon::new(config).await.expect("daemon init");

    let credential = Credential::new("sk-test-daemon".into(), "integration-test", 1_000);
    daemon
        .store()
        .credentials
        .insert(credential.clone())
        .await
        .expect("insert credential");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = daemon.run_with_listener(listener).await;
    });

    // Give the worker loop a moment to spawn before the caller fires requests.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    (format!("http://{addr}"), credential.key)
}
