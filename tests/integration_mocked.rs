/// Integration tests with a mocked customers API
/// Exercises the remote customer source without hitting a real CRM
use crm_metrics_api::errors::AppError;
use crm_metrics_api::store::{CustomerStore, RemoteCustomerSource, SnapshotCache};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote(server: &MockServer) -> RemoteCustomerSource {
    RemoteCustomerSource::new(server.uri(), "test_token".to_string()).unwrap()
}

#[tokio::test]
async fn test_fetch_all_sends_bearer_and_normalizes() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!([
        {
            "_id": {"$oid": "65f1"},
            "name": "João da Silva",
            "total_orders": "3",
            "lead_score": 77,
            "created_at": {"$date": "2024-06-10T09:00:00Z"}
        },
        {"id": "c2", "consumption": null},
        "not a customer"
    ]);

    Mock::given(method("GET"))
        .and(path("/api/customers"))
        .and(header("authorization", "Bearer test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let customers = remote(&mock_server).fetch_all().await.unwrap();

    assert_eq!(customers.len(), 2);
    assert_eq!(customers[0].id, "65f1");
    assert_eq!(customers[0].total_orders, 3);
    assert!(customers[0].created_at.is_some());
    assert_eq!(customers[1].consumption, 0.0);
}

#[tokio::test]
async fn test_fetch_by_id_found_and_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/customers/c1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1", "name": "Ana"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/customers/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let source = remote(&mock_server);
    assert_eq!(source.fetch_by_id("c1").await.unwrap().unwrap().name, "Ana");
    assert!(source.fetch_by_id("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_array_payload_is_external_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&mock_server)
        .await;

    let result = remote(&mock_server).fetch_all().await;
    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(5)
        .mount(&mock_server)
        .await;

    let source = remote(&mock_server);

    for _ in 0..5 {
        match source.fetch_all().await {
            Err(AppError::ExternalApiError(msg)) => assert!(msg.contains("500")),
            other => panic!("expected upstream error, got {:?}", other.map(|c| c.len())),
        }
    }

    // Sixth call is rejected without reaching the server.
    match source.fetch_all().await {
        Err(AppError::ExternalApiError(msg)) => assert!(msg.contains("circuit open")),
        other => panic!("expected rejection, got {:?}", other.map(|c| c.len())),
    }
}

#[tokio::test]
async fn test_snapshot_cache_fetches_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "a"}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = SnapshotCache::new(
        CustomerStore::Remote(remote(&mock_server)),
        Duration::from_secs(30),
    );

    let first = cache.snapshot().await.unwrap();
    let second = cache.snapshot().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

#[tokio::test]
async fn test_upstream_failure_surfaces_as_bad_gateway() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let cache = SnapshotCache::new(
        CustomerStore::Remote(remote(&mock_server)),
        Duration::from_secs(30),
    );

    let err = cache.snapshot().await.unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
}
