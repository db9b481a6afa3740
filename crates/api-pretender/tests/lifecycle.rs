//! Integration tests for starting, stopping and restarting mocks.

use api_pretender::{CapturingReporter, MockServer};
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

fn client() -> Client {
    Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build HTTP client")
}

#[test]
fn test_start_and_stop() {
    let mut mock = MockServer::new();
    let url = mock.start().unwrap();
    let second_start_url = mock.start().unwrap();
    assert!(!url.is_empty());
    assert_eq!(url, second_start_url);

    mock.stop();
    assert!(mock.server_handle().is_none());
}

#[test]
fn test_stop_twice() {
    let mut mock = MockServer::new();
    mock.start().unwrap();
    mock.stop();
    mock.stop();
    assert!(mock.server_handle().is_none());
}

#[test]
fn test_stop_before_start() {
    let mut mock = MockServer::new();
    mock.stop();
    assert!(!mock.is_running());
}

#[test]
fn test_server_handle() {
    let mut mock = MockServer::new();
    assert!(mock.server_handle().is_none());
    mock.start().unwrap();
    assert!(mock.server_handle().is_some());
    mock.stop();
}

#[tokio::test]
async fn test_stopped_server_refuses_connections() {
    let mut mock = MockServer::new();
    let url = mock.start().unwrap();
    assert!(client().get(&url).send().await.is_ok());

    mock.stop();
    assert!(client().get(&url).send().await.is_err());
}

#[tokio::test]
async fn test_restart_serves_on_fresh_url() {
    let reporter = Arc::new(CapturingReporter::new());
    let mut mock = MockServer::new().path("/ping").reporter(reporter.clone());
    let first = mock.start().unwrap();
    mock.stop();

    let second = mock.start().unwrap();
    let response = client().get(format!("{second}/ping")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(first.starts_with("http://127.0.0.1:"));
    reporter.assert_clean();
    mock.stop();
}

#[tokio::test]
async fn test_reconfiguring_running_mock_applies_to_later_requests() {
    let reporter = Arc::new(CapturingReporter::new());
    let mut mock = MockServer::new().path("/v1").reporter(reporter.clone());
    let url = mock.start().unwrap();

    client().get(format!("{url}/v2")).send().await.unwrap();
    reporter.assert_reported(&["GoAPIpretender: invalid path, got: '/v2' expected: '/v1'"]);
    reporter.clear();

    let mut mock = mock.path("/v2");
    client().get(format!("{url}/v2")).send().await.unwrap();
    reporter.assert_clean();
    mock.stop();
}

#[tokio::test]
async fn test_concurrent_requests_each_report() {
    let reporter = Arc::new(CapturingReporter::new());
    let mut mock = MockServer::new().method("POST").reporter(reporter.clone());
    let url = mock.start().unwrap();

    let client = client();
    let requests = (0..16).map(|_| client.get(&url).send());
    for response in join_all(requests).await {
        assert_eq!(response.unwrap().status(), 200);
    }

    let errors = reporter.errors();
    assert_eq!(errors.len(), 16);
    assert!(errors
        .iter()
        .all(|e| e == "GoAPIpretender: invalid method, got: 'GET' expected: 'POST'"));
    mock.stop();
}

#[test]
fn test_drop_stops_server() {
    let addr = {
        let mut mock = MockServer::new();
        mock.start().unwrap();
        mock.server_handle().unwrap().addr()
    };
    assert!(std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_err());
}
