/// HTTP tests driving the full router against an in-memory customer source
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use crm_metrics_api::api;
use crm_metrics_api::config::{Config, CustomerSourceConfig};
use crm_metrics_api::handlers::AppState;
use crm_metrics_api::models::CustomerRecord;
use crm_metrics_api::store::{CustomerStore, StaticCustomerSource};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const AS_OF: &str = "2024-06-15T12:00:00Z";

fn as_of() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(AS_OF)
        .unwrap()
        .with_timezone(&Utc)
}

/// Helper function to create test config
fn create_test_config() -> Config {
    Config {
        port: 0,
        source: CustomerSourceConfig::File {
            path: "customers.json".into(),
        },
        cors_origin: None,
        snapshot_ttl: std::time::Duration::from_secs(30),
        as_of_resolution: std::time::Duration::from_secs(60),
        insight_delay: std::time::Duration::ZERO,
    }
}

fn sample_customers() -> Vec<CustomerRecord> {
    vec![
        CustomerRecord {
            id: "ana".into(),
            name: "Ana".into(),
            average_ticket: 150.0,
            consumption: 450.0,
            lead_score: 90.0,
            total_visits: 3,
            customer_since: Some(as_of() - Duration::days(2)),
            created_at: Some(as_of() - Duration::days(2)),
            last_visit_date: Some(as_of() - Duration::days(1)),
            ..Default::default()
        },
        CustomerRecord {
            id: "bruno".into(),
            name: "Bruno".into(),
            average_ticket: 40.0,
            consumption: 1200.0,
            lead_score: 40.0,
            total_visits: 8,
            total_orders: 4,
            customer_since: Some(as_of() - Duration::days(200)),
            created_at: Some(as_of() - Duration::days(200)),
            last_visit_date: Some(as_of() - Duration::days(45)),
            ..Default::default()
        },
    ]
}

fn test_app(customers: Vec<CustomerRecord>) -> Router {
    let store = CustomerStore::Static(StaticCustomerSource::new(customers));
    let state = Arc::new(AppState::new(create_test_config(), store));
    api::app(state, api::api_routes())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(test_app(vec![]), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["customer_source"], "file");
}

#[tokio::test]
async fn test_list_and_get_customer() {
    let app = test_app(sample_customers());

    let (status, body) = get(app.clone(), "/api/customers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = get(app.clone(), "/api/customers/bruno").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bruno");

    let (status, body) = get(app, "/api/customers/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn test_overview_shape() {
    let uri = format!("/api/customers/overview?as_of={}", AS_OF);
    let (status, body) = get(test_app(sample_customers()), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asOf"], AS_OF);
    assert_eq!(body["metrics"]["status"], "ok");
    assert_eq!(body["metrics"]["totalCustomers"], 2);
    assert_eq!(body["metrics"]["newCustomersCount"], 1);
    assert_eq!(body["metrics"]["averageLeadScore"], 65.0);
    assert_eq!(body["metrics"]["topCustomers"][0]["id"], "ana");
    assert_eq!(body["display"]["newCustomers"], "+1");

    let segments = body["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 6);
    let counts: Vec<u64> = segments
        .iter()
        .map(|s| s["count"].as_u64().unwrap())
        .collect();
    // top spenders, novos clientes, em risco, novos fans, fans 10+, super fans
    assert_eq!(counts, vec![1, 1, 1, 1, 0, 1]);
}

#[tokio::test]
async fn test_overview_of_empty_source() {
    let uri = format!("/api/customers/overview?as_of={}", AS_OF);
    let (status, body) = get(test_app(vec![]), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["status"], "insufficient_data");
    assert!(body["metrics"]["averageTicket"].is_null());
    assert!(body["display"].is_null());
}

#[tokio::test]
async fn test_invalid_as_of_is_bad_request() {
    let (status, _) = get(
        test_app(sample_customers()),
        "/api/customers/overview/metrics?as_of=yesterday",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_and_segments_endpoints() {
    let app = test_app(sample_customers());

    let (status, body) = get(
        app.clone(),
        &format!("/api/customers/overview/metrics?as_of={}", AS_OF),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalConsumption"], 1650.0);

    let (status, body) = get(
        app,
        &format!("/api/customers/overview/segments?as_of={}", AS_OF),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[2]["slug"], "em-risco");
    assert_eq!(body[2]["count"], 1);
}

#[tokio::test]
async fn test_trend_endpoint() {
    let app = test_app(sample_customers());

    let (status, body) = get(
        app.clone(),
        &format!("/api/customers/overview/trend?range=30d&as_of={}", AS_OF),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["date"], "2024-06-13");

    let (status, body) = get(
        app.clone(),
        &format!("/api/customers/overview/trend?range=365d&as_of={}", AS_OF),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = get(app, "/api/customers/overview/trend?range=2w").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_segment_members() {
    let app = test_app(sample_customers());

    let (status, body) = get(
        app.clone(),
        &format!("/api/customers/segments/em-risco?as_of={}", AS_OF),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["segment"]["name"], "Em Risco");
    assert_eq!(body["segment"]["count"], 1);
    assert_eq!(body["customers"][0]["id"], "bruno");

    let (status, _) = get(app, "/api/customers/segments/vips").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_insight() {
    let app = test_app(sample_customers());

    let (status, body) = send(
        app.clone(),
        Request::post("/api/customers/ana/generate-insight")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customerId"], "ana");
    assert_eq!(body["retentionScore"], 85);

    let (status, _) = send(
        app,
        Request::post("/api/customers/ghost/generate-insight")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_evaluate_supplied_customers() {
    let uri = format!("/api/overview/evaluate?as_of={}", AS_OF);
    let (status, body) = post_json(
        test_app(vec![]),
        &uri,
        json!([
            {"_id": {"$oid": "x1"}, "lead_score": 90, "average_ticket": "150.5"},
            {"id": "x2", "lead_score": null, "total_visits": 12}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["totalCustomers"], 2);
    assert_eq!(body["metrics"]["averageLeadScore"], 45.0);
    assert_eq!(body["metrics"]["topCustomers"][0]["id"], "x1");
    assert_eq!(body["segments"][0]["count"], 1);
    assert_eq!(body["segments"][5]["count"], 1);
}

#[tokio::test]
async fn test_evaluate_keeps_customers_with_malformed_feedback() {
    let uri = format!("/api/overview/evaluate?as_of={}", AS_OF);
    let (status, body) = post_json(
        test_app(vec![]),
        &uri,
        json!([
            {"id": "a", "lead_score": 10},
            {"id": "b", "lead_score": 30, "evaluation": "great"},
            {"id": "c", "evaluation": 5}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["totalCustomers"], 3);
    assert_eq!(body["metrics"]["topCustomers"][0]["id"], "b");
    assert!(body["metrics"]["topCustomers"][0]["evaluation"].is_null());
}

#[tokio::test]
async fn test_reserved_view_names_shadow_customer_ids() {
    assert!(api::RESERVED_CUSTOMER_PATHS.contains(&"overview"));

    let mut customers = sample_customers();
    customers.push(CustomerRecord {
        id: "overview".into(),
        name: "Shadowed".into(),
        ..Default::default()
    });
    let app = test_app(customers);

    let uri = format!("/api/customers/overview?as_of={}", AS_OF);
    let (status, body) = get(app.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["totalCustomers"], 3);
    assert!(body.get("name").is_none());

    let (status, body) = get(app, "/api/customers").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["id"] == "overview"));
}

#[tokio::test]
async fn test_evaluate_rejects_non_array() {
    let app = test_app(vec![]);

    let (status, body) = post_json(app.clone(), "/api/overview/evaluate", json!({"customers": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("array"));

    let (status, _) = post_json(app, "/api/overview/evaluate", json!(null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (status, body) = get(test_app(vec![]), "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/customers/overview"].is_object());
}
