use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use data_destruction_gateway::api::{router, AppState};
use data_destruction_gateway::registry::ProtocolRegistry;
use data_destruction_gateway::store::{MemoryStore, StoreCall};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PROTOCOLS: &str = r#"{
    "roi_physical_activity": {"dataset": "D", "table": "T", "operation": "delete_row"},
    "roi_masking": {"dataset": "D", "table": "T", "operation": "mask_fields"}
}"#;

fn app(store: Arc<MemoryStore>, registry: ProtocolRegistry) -> Router {
    router(Arc::new(AppState::new(registry, store)))
}

fn default_app(store: Arc<MemoryStore>) -> Router {
    let registry = ProtocolRegistry::from_json_str(PROTOCOLS).expect("valid protocols");
    app(store, registry)
}

fn store_with(rows: &[&str]) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new("connect-prod").with_table("D", "T", rows.iter().copied()))
}

async fn post(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
    post(app, "/", body.to_string()).await
}

#[tokio::test]
async fn deletes_existing_and_reports_missing() {
    let store = store_with(&["1", "2"]);

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_physical_activity", "connect_ids": ["1", "3"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "Deleted 1 records from connect-prod.D.T",
            "deleted_ids": ["1"],
            "not_found": ["3"]
        })
    );
    assert_eq!(
        store.calls().await,
        vec![
            StoreCall::ExistenceCheck {
                target: "connect-prod.D.T".to_string(),
                ids: vec!["1".to_string(), "3".to_string()],
            },
            StoreCall::Delete {
                target: "connect-prod.D.T".to_string(),
                ids: vec!["1".to_string()],
            },
        ]
    );
    assert_eq!(store.rows("D", "T").await.unwrap(), vec!["2".to_string()]);
}

#[tokio::test]
async fn no_match_issues_no_delete() {
    let store = store_with(&["1"]);

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_physical_activity", "connect_ids": ["8", "9", "8"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": "No matching Connect_IDs found", "not_found": ["8", "9"]})
    );
    assert!(store.delete_calls().await.is_empty());
}

#[tokio::test]
async fn repeated_request_deletes_nothing() {
    let store = store_with(&["1", "2", "3"]);
    let request = json!({"protocol": "roi_physical_activity", "connect_ids": ["1", "2"]});

    let (_, first) = post_json(default_app(store.clone()), request.clone()).await;
    assert_eq!(first["deleted_ids"], json!(["1", "2"]));

    let (status, second) = post_json(default_app(store.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second.get("deleted_ids").is_none());
    assert_eq!(second["not_found"], json!(["1", "2"]));
    assert_eq!(store.delete_calls().await.len(), 1);
}

#[tokio::test]
async fn identifiers_are_normalized() {
    let store = store_with(&["123", "456", "789"]);

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_physical_activity", "connect_ids": [" 123 ", 456]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_ids"], json!(["123", "456"]));
    assert_eq!(
        store.delete_calls().await,
        vec![vec!["123".to_string(), "456".to_string()]]
    );
}

#[tokio::test]
async fn unsupported_protocol_lists_allowed() {
    let store = store_with(&["1"]);

    let (status, body) = post_json(
        app(store.clone(), ProtocolRegistry::builtin()),
        json!({"protocol": "bogus", "connect_ids": ["1"]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "'bogus' is not a supported protocol. Allowed: ['roi_physical_activity']"})
    );
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn caller_errors_are_bad_request() {
    let cases = [
        ("{not json", "Request body must be a valid JSON object"),
        (r#"{"connect_ids": ["1"]}"#, "Missing or invalid parameter: protocol (str)"),
        (
            r#"{"protocol": "roi_physical_activity", "connect_ids": "1"}"#,
            "connect_ids must be a list",
        ),
        (
            r#"{"protocol": "roi_physical_activity", "connect_ids": []}"#,
            "connect_ids must be a non-empty list",
        ),
    ];

    for (raw, expected) in cases {
        let store = store_with(&["1"]);
        let (status, body) = post(default_app(store.clone()), "/", raw).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", raw);
        assert_eq!(body, json!({"error": expected}), "{}", raw);
        assert!(store.calls().await.is_empty());
    }
}

#[tokio::test]
async fn unimplemented_operation_is_server_error() {
    let store = store_with(&["1"]);

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_masking", "connect_ids": ["1"]}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Function 'mask_fields' not implemented"}));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn store_failure_is_server_error() {
    let store = store_with(&["1"]);
    store.fail_delete("permission denied for table T").await;

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_physical_activity", "connect_ids": ["1"]}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("permission denied for table T"));
    assert_eq!(store.rows("D", "T").await.unwrap(), vec!["1".to_string()]);
}

#[tokio::test]
async fn blank_ids_are_reported_not_found() {
    let store = store_with(&["9"]);

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_physical_activity", "connect_ids": [" ", "9"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_ids"], json!(["9"]));
    assert_eq!(body["not_found"], json!([""]));
    assert_eq!(store.delete_calls().await, vec![vec!["9".to_string()]]);
}

#[tokio::test]
async fn oversized_body_gets_json_error() {
    let store = store_with(&["1"]);
    let registry = ProtocolRegistry::from_json_str(PROTOCOLS).expect("valid protocols");
    let app = router(Arc::new(
        AppState::new(registry, store.clone()).with_max_body_bytes(1024),
    ));

    let ids: Vec<String> = (0..500).map(|i| format!("{:09}", i)).collect();
    let (status, body) = post_json(
        app,
        json!({"protocol": "roi_physical_activity", "connect_ids": ids}),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Request body could not be read"));
    assert!(store.calls().await.is_empty());
}

#[tokio::test]
async fn bulk_request_fits_default_limit() {
    let ids: Vec<String> = (0..250_000).map(|i| format!("{:09}", i)).collect();
    let store = Arc::new(MemoryStore::new("connect-prod").with_table("D", "T", ids[..10].to_vec()));

    let (status, body) = post_json(
        default_app(store.clone()),
        json!({"protocol": "roi_physical_activity", "connect_ids": ids}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted 10 records from connect-prod.D.T");
    assert_eq!(body["not_found"].as_array().unwrap().len(), 249_990);
}

#[tokio::test]
async fn legacy_path_is_routed() {
    let store = store_with(&["5"]);

    let (status, body) = post(
        default_app(store),
        "/run_bq_data_destruction",
        json!({"protocol": "roi_physical_activity", "connect_ids": ["5"]}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_ids"], json!(["5"]));
}

#[tokio::test]
async fn health_reports_registry_size() {
    let response = default_app(store_with(&[]))
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store_connected"], true);
    assert_eq!(body["protocols"], 2);
}
