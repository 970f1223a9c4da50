//! Integration tests for the reqwest-backed transport.
//!
//! These tests run [`HttpClient`] end to end against a local mock server.

use request_layer::{
    BaseUrl, ClientConfig, ErrorKind, HttpClient, RequestError, RequestOptions,
    SUPERSEDED_REASON,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_client(server: &MockServer) -> HttpClient {
    let config = ClientConfig::builder()
        .base_url(BaseUrl::new(server.uri()).unwrap())
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    HttpClient::new(config).unwrap()
}

#[tokio::test]
async fn test_get_sends_query_and_default_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let body = client
        .get("/users", RequestOptions::new().query_param("page", 2))
        .await
        .unwrap();

    assert_eq!(body, json!({"users": []}));
    let received = mock_server.received_requests().await.unwrap();
    assert!(received[0]
        .url
        .query_pairs()
        .any(|(key, _)| key == "_t"));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"name": "Ada"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let body = client
        .post("/users", Some(json!({"name": "Ada"})), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(body, json!({"id": 1}));
}

#[tokio::test]
async fn test_error_status_maps_to_http_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let result = client.get("/missing", RequestOptions::new()).await;

    assert_eq!(
        result.unwrap_err(),
        RequestError::HttpStatus {
            status: 404,
            body: json!({"error": "not found"})
        }
    );
}

#[tokio::test]
async fn test_empty_and_plain_text_bodies() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);

    let deleted = client.delete("/users/1", RequestOptions::new()).await.unwrap();
    assert_eq!(deleted, json!(null));

    let health = client.get("/health", RequestOptions::new()).await.unwrap();
    assert_eq!(health, json!("OK"));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let body = client
        .get(
            "/flaky",
            RequestOptions::new()
                .retry(3)
                .retry_delay(Duration::from_millis(5)),
        )
        .await
        .unwrap();

    assert_eq!(body, json!({"ok": true}));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_timeout_maps_to_network_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let config = ClientConfig::builder()
        .base_url(BaseUrl::new(mock_server.uri()).unwrap())
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let client = HttpClient::new(config).unwrap();

    let result = client.get("/slow", RequestOptions::new()).await;

    match result {
        Err(RequestError::Network { timeout, .. }) => assert!(timeout),
        other => panic!("Expected a network timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_request_is_cancelled_over_the_wire() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"hits": 3}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let options = || RequestOptions::new().query_param("q", "rust");

    let (first, second) = tokio::join!(client.get("/search", options()), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.get("/search", options()).await
    });

    let first = first.unwrap_err();
    assert_eq!(first.kind(), ErrorKind::Cancelled);
    assert_eq!(
        first,
        RequestError::Cancelled {
            reason: SUPERSEDED_REASON.to_string()
        }
    );
    assert_eq!(second.unwrap(), json!({"hits": 3}));
    assert_eq!(client.in_flight(), 0);
}
