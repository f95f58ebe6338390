//! HTTP tests for the LlamaStack probe client
//!
//! Each test serves a small axum router on an ephemeral port.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use llamastack_client::{LlamaStackClient, LlamaStackError, ServerEndpoint, ServerProbe};
use std::time::Duration;

async fn serve(app: Router) -> ServerEndpoint {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ServerEndpoint::new(format!("http://{}", addr))
}

#[tokio::test]
async fn test_health_ok() {
    let endpoint = serve(Router::new().route("/v1/health", get(|| async { StatusCode::OK }))).await;
    let client = LlamaStackClient::new().unwrap();
    assert!(client.check_health(&endpoint).await.unwrap());
}

#[tokio::test]
async fn test_health_non_200_is_unhealthy_not_error() {
    let endpoint = serve(Router::new().route(
        "/v1/health",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    ))
    .await;
    let client = LlamaStackClient::new().unwrap();
    assert!(!client.check_health(&endpoint).await.unwrap());
}

#[tokio::test]
async fn test_health_connection_refused_is_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LlamaStackClient::new().unwrap();
    let err = client
        .check_health(&ServerEndpoint::new(format!("http://{}", addr)))
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_health_timeout_is_error() {
    let endpoint = serve(Router::new().route(
        "/v1/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK
        }),
    ))
    .await;
    let client = LlamaStackClient::with_timeout(Duration::from_millis(200)).unwrap();
    let err = client.check_health(&endpoint).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_list_providers() {
    let body = r#"{"data":[
        {"api":"inference","provider_id":"ollama","provider_type":"remote::ollama","health":{"status":"OK"}},
        {"api":"safety","provider_id":"llama-guard","provider_type":"inline::llama-guard"}
    ]}"#;
    let endpoint = serve(Router::new().route("/v1/providers", get(move || async move { body }))).await;

    let client = LlamaStackClient::new().unwrap();
    let providers = client.list_providers(&endpoint).await.unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].provider_id, "ollama");
    assert_eq!(providers[1].api, "safety");
}

#[tokio::test]
async fn test_list_providers_malformed_body() {
    let endpoint = serve(Router::new().route("/v1/providers", get(|| async { "not json" }))).await;
    let client = LlamaStackClient::new().unwrap();
    let err = client.list_providers(&endpoint).await.unwrap_err();
    assert!(matches!(err, LlamaStackError::Serialization(_)));
}

#[tokio::test]
async fn test_list_providers_non_200() {
    let endpoint = serve(Router::new().route(
        "/v1/providers",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;
    let client = LlamaStackClient::new().unwrap();
    let err = client.list_providers(&endpoint).await.unwrap_err();
    assert!(matches!(err, LlamaStackError::Status(500)));
}
