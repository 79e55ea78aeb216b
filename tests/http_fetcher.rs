//! HTTP fetcher tests against a one-shot local responder.

#![cfg(feature = "http")]

use hotswap_settings::error::TransportError;
use hotswap_settings::sources::{
    ConfigFetcher, FetchedConfig, HttpFetcher, NEVER_POLLED, Notification, PollOutcome,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve a single request with `status` and `body`, returning the base URL
/// and a handle resolving to the request line that was received.
async fn respond_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let request = String::from_utf8_lossy(&request).to_string();
        request.lines().next().unwrap_or_default().to_string()
    });

    (base_url, handle)
}

fn fetcher(base_url: &str) -> HttpFetcher {
    HttpFetcher::builder()
        .with_meta_url(format!("{}/", base_url))
        .with_app_id("billing")
        .with_cluster("prod")
        .with_fetch_timeout(Duration::from_secs(5))
        .with_polling_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_fetch_config_parses_payload() {
    let body = r#"{"appId":"billing","cluster":"prod","namespaceName":"application","releaseKey":"20240101-r1","configurations":{"timeout":"30","greeting":"hi"}}"#;
    let (base_url, server) = respond_once("200 OK", body).await;

    let fetched = fetcher(&base_url).fetch_config("application").await.unwrap();

    assert_eq!(
        fetched,
        FetchedConfig::new("20240101-r1", [("timeout", "30"), ("greeting", "hi")])
    );
    assert_eq!(
        server.await.unwrap(),
        "GET /configs/billing/prod/application HTTP/1.1"
    );
}

#[tokio::test]
async fn test_fetch_release_sends_release_key_with_messages() {
    let body = r#"{"releaseKey":"r2","configurations":{}}"#;
    let (base_url, server) = respond_once("200 OK", body).await;

    let fetched = fetcher(&base_url)
        .fetch_release("application", Some("r1"), Some("m"))
        .await
        .unwrap();

    assert_eq!(fetched.release_key, "r2");
    assert!(fetched.configurations.is_empty());
    assert_eq!(
        server.await.unwrap(),
        "GET /configs/billing/prod/application?releasekey=r1&messages=m HTTP/1.1"
    );
}

#[tokio::test]
async fn test_fetch_config_error_status() {
    let (base_url, server) = respond_once("404 Not Found", "{}").await;

    let err = fetcher(&base_url).fetch_config("missing").await.unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 404, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_fetch_config_rejects_malformed_body() {
    let (base_url, server) = respond_once("200 OK", r#"{"releaseKey":"r1"}"#).await;

    let err = fetcher(&base_url).fetch_config("application").await.unwrap_err();

    assert!(matches!(err, TransportError::Decode { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_poll_reports_changed_namespaces() {
    let body = r#"[{"namespaceName":"application","notificationId":42}]"#;
    let (base_url, server) = respond_once("200 OK", body).await;

    let outcome = fetcher(&base_url)
        .poll_notifications(&[Notification::new("application", NEVER_POLLED)])
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PollOutcome::Changed(vec![Notification::new("application", 42)])
    );

    let request_line = server.await.unwrap();
    assert!(request_line.starts_with("GET /notifications/v2?appId=billing&cluster=prod&notifications="));
    assert!(request_line.contains("namespaceName"));
}

#[tokio::test]
async fn test_poll_not_modified() {
    let (base_url, server) = respond_once("304 Not Modified", "").await;

    let outcome = fetcher(&base_url)
        .poll_notifications(&[Notification::new("application", 7)])
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::NotChanged);
    server.await.unwrap();
}

#[tokio::test]
async fn test_poll_server_error() {
    let (base_url, server) = respond_once("500 Internal Server Error", "{}").await;

    let err = fetcher(&base_url)
        .poll_notifications(&[Notification::new("application", 7)])
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 500, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = fetcher(&base_url).fetch_config("application").await.unwrap_err();

    assert!(matches!(err, TransportError::Request { .. }));
}
