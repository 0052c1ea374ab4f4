// domain-verify/tests/performance.rs

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn test_batch_trace_runs_concurrently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ok")
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let urls: Vec<String> = (0..10).map(|i| format!("{}/page/{}", server.uri(), i)).collect();

    let mut cmd = Command::cargo_bin("domain-verify").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("DV_CONCURRENCY")
        .env_remove("DV_CONFIG")
        .arg("trace")
        .args(&urls)
        .args(["--json", "--concurrency", "10"])
        .timeout(Duration::from_secs(30));

    let start = Instant::now();
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();
    let duration = start.elapsed();

    output.assert().success();

    // Sequentially: 10 URLs x (trace + desktop probe) x 400ms = 8s
    assert!(
        duration < Duration::from_secs(6),
        "Batch trace took too long: {:?}",
        duration
    );
}
