//! Generative client integration tests
//!
//! Transient backend failures are absorbed by the client's retry policy and
//! never consume self-healing iterations; analysis degrades to a fallback
//! report when the backend stays unavailable.

use retrofit::build::BuildVerifier;
use retrofit::llm::{
    BackendError, BackendKind, GenerationRequest, GenerativeBackend, GenerativeClient,
    LazyBackend, MockGenerativeBackend, MockResponse, TaskKind,
};
use retrofit::storage::LocalStore;
use retrofit::{RetrofitConfig, SelfHealingOrchestrator};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

fn network_error() -> MockResponse {
    MockResponse::error(BackendError::NetworkError {
        message: "connection reset".to_string(),
    })
}

fn analysis() -> MockResponse {
    MockResponse::structured(json!({
        "target_filename": "app.py",
        "detected_issues": [
            {"type": "PYTHON2_SYNTAX", "severity": "HIGH", "line": 1,
             "description": "print statement", "suggestion": "use print()"}
        ],
        "detected_patterns": ["python2_print"],
        "recommendation": "Port to Python 3"
    }))
}

fn rewrite() -> MockResponse {
    MockResponse::structured(json!({
        "rewritten_code": "print('hi')\n",
        "build_manifest": "FROM python:3.11-slim\nCMD [\"python\", \"app.py\"]\n",
        "changes": ["print function"]
    }))
}

struct Fixture {
    dir: TempDir,
    upload: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let upload = dir.path().join("app.py");
    std::fs::write(&upload, "print 'hi'\n").unwrap();
    Fixture { dir, upload }
}

fn orchestrator(fx: &Fixture, client: GenerativeClient) -> SelfHealingOrchestrator {
    SelfHealingOrchestrator::new(
        client,
        BuildVerifier::simulated(),
        Arc::new(LocalStore::new(fx.dir.path().join("store"))),
        fx.dir.path().join("work"),
    )
}

#[tokio::test(start_paused = true)]
async fn test_transient_analysis_failures_are_retried() {
    let fx = fixture();
    let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::CloudKey));
    mock.add_responses([network_error(), network_error(), analysis(), rewrite()]);

    let client = GenerativeClient::new(mock.clone()).with_retry_policy(2, Duration::from_secs(1));
    let start = Instant::now();
    let outcome = orchestrator(&fx, client).run(&fx.upload).await.unwrap();

    assert_eq!(outcome.iteration, 1);
    assert_eq!(outcome.report.recommendation, "Port to Python 3");
    assert_eq!(mock.call_count(), 4);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_backend_degrades_analysis() {
    let fx = fixture();
    let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::CloudCredential));
    mock.add_responses([network_error(), network_error(), network_error(), rewrite()]);

    let client = GenerativeClient::new(mock.clone()).with_retry_policy(2, Duration::from_millis(10));
    let outcome = orchestrator(&fx, client).run(&fx.upload).await.unwrap();

    assert_eq!(outcome.issues_found, 1);
    assert_eq!(outcome.report.detected_issues[0].kind, "LEGACY_PATTERN");
    assert_eq!(outcome.iteration, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_rewrite_retries_cost_one_iteration() {
    let fx = fixture();
    let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::CloudKey));
    mock.add_responses([
        analysis(),
        network_error(),
        network_error(),
        network_error(),
        rewrite(),
    ]);

    let client = GenerativeClient::new(mock.clone()).with_retry_policy(2, Duration::from_millis(10));
    let outcome = orchestrator(&fx, client).run(&fx.upload).await.unwrap();

    assert_eq!(outcome.iteration, 2);
    assert_eq!(mock.call_count(), 5);
    assert!(mock.requests()[4].prompt.contains("PREVIOUS ATTEMPT FAILED"));
}

#[tokio::test]
async fn test_local_server_is_not_retried() {
    let mock = Arc::new(MockGenerativeBackend::with_kind(BackendKind::LocalServer));
    mock.add_responses([network_error(), MockResponse::text("{}")]);

    let client = GenerativeClient::new(mock.clone()).with_retry_policy(5, Duration::from_secs(1));
    let err = client
        .complete(&GenerationRequest::new(TaskKind::Analysis, "prompt"))
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 1);
    assert_eq!(mock.remaining_responses(), 1);
}

#[tokio::test]
async fn test_lazy_backend_selects_on_first_use() {
    let mut config = RetrofitConfig::default();
    config.local_endpoint = None;
    config.api_key = None;
    config.credentials_path = None;

    let lazy = Arc::new(LazyBackend::new(config));
    assert!(!lazy.is_initialized());

    let completion = lazy
        .complete(&GenerationRequest::new(
            TaskKind::Analysis,
            "Filename: app.py\n```python\nprint 'hi'\n```",
        ))
        .await
        .unwrap();

    assert!(lazy.is_initialized());
    assert!(!completion.is_empty());
    assert_eq!(lazy.kind(), BackendKind::Simulator);
    assert_eq!(lazy.description(), "built-in simulator");
}
