//! HTTP transport and channel against a mock daemon
//!
//! Covers how daemon answers map onto `FailureKind` and what the channel
//! hands back to callers.

use nodelink_client::{FailureKind, HttpTransport, RpcChannel, Transport};
use nodelink_protocol::RpcRequest;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("rpcuser:secret")
const AUTH: &str = "Basic cnBjdXNlcjpzZWNyZXQ=";

fn channel_for(url: String) -> RpcChannel {
    let transport = HttpTransport::with_url(reqwest::Client::new(), url, "rpcuser", "secret");
    RpcChannel::new(Arc::new(transport))
}

/// Port nothing listens on
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_request_sends_basic_auth_and_returns_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("authorization", AUTH))
        .and(header("content-type", "text/plain"))
        .and(body_partial_json(json!({"jsonrpc": "1.0", "method": "getinfo", "params": []})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"blocks": 1200, "connections": 4},
            "error": null,
            "id": "nodelink"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = channel_for(format!("{}/", server.uri()))
        .request(RpcRequest::new("getinfo"))
        .await
        .expect("getinfo should succeed");

    assert_eq!(result["blocks"], 1200);
}

#[tokio::test]
async fn test_unauthorized_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = channel_for(format!("{}/", server.uri()))
        .request(RpcRequest::new("getinfo"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::AuthFailed);
    assert!(err.body.is_none());
}

#[tokio::test]
async fn test_warming_daemon_reports_initializing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "result": null,
            "error": {"code": -28, "message": "Loading block index..."},
            "id": "nodelink"
        })))
        .mount(&server)
        .await;

    let err = channel_for(format!("{}/", server.uri()))
        .request(RpcRequest::new("getinfo"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::ServerError);
    assert!(err.is_server_initializing());
    assert_eq!(err.user_message(), "Loading block index...");
    assert_eq!(err.error_body().unwrap().code, -28);
}

#[tokio::test]
async fn test_bare_500_is_not_initializing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = channel_for(format!("{}/", server.uri()))
        .request(RpcRequest::new("getinfo"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::ServerError);
    assert!(!err.is_server_initializing());
}

#[tokio::test]
async fn test_other_status_keeps_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = channel_for(format!("{}/", server.uri()))
        .request(RpcRequest::new("getinfo"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Http(404));
}

#[tokio::test]
async fn test_nothing_listening_is_connection_refused() {
    let transport = HttpTransport::with_url(
        reqwest::Client::new(),
        format!("http://127.0.0.1:{}/", closed_port()),
        "rpcuser",
        "secret",
    );

    let err = transport.post(b"{}".to_vec()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::ConnectionRefused);
}

#[tokio::test]
async fn test_success_body_without_object_is_unknown_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = channel_for(format!("{}/", server.uri()))
        .request(RpcRequest::new("getinfo"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Malformed);
    assert_eq!(err.message, "Unknown error");
}
