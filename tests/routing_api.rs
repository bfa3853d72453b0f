//! Routing and pool administration over HTTP.

use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_invocations_follow_weighted_rotation() {
    let app = common::spawn_app(common::test_config()).await;

    let mut servers = Vec::new();
    for i in 0..10u64 {
        let res = app
            .client
            .post(app.url("/endpoints/llm/invocations"))
            .header("InputLocation", "s3://bucket/input.json")
            .header("InferenceId", format!("req-{}", i))
            .header("Authorization", "dropped")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["request_count"], i + 1);
        assert_eq!(body["counter_source"], "exact");
        assert_eq!(
            body["endpoint_name"],
            format!("llm-{}", body["server"].as_str().unwrap())
        );
        assert_eq!(body["input_headers"]["InputLocation"], "s3://bucket/input.json");
        assert!(body["input_headers"].get("Authorization").is_none());
        servers.push(body["server"].as_str().unwrap().to_string());
    }

    let count = |name: &str| servers.iter().filter(|s| *s == name).count();
    assert_eq!((count("server1"), count("server2"), count("server3")), (5, 3, 2));
    assert_eq!(&servers[..5], &["server1"; 5]);
}

#[tokio::test]
async fn test_invocation_requires_input_location() {
    let app = common::spawn_app(common::test_config()).await;

    let res = app
        .client
        .post(app.url("/endpoints/llm/invocations"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Missing required header: InputLocation");
    assert_eq!(body["kind"], "InvalidRequest");
}

#[tokio::test]
async fn test_pool_bootstrap_and_update() {
    let app = common::spawn_app(common::test_config()).await;

    let pool: Value = app.client.get(app.url("/pool")).send().await.unwrap().json().await.unwrap();
    assert_eq!(pool["servers"], json!(["server1", "server2", "server3"]));
    assert_eq!(pool["weights"], json!([5, 3, 2]));
    assert_eq!(pool["current_instance_count"], json!([5, 3, 2]));

    let res = app
        .client
        .put(app.url("/pool"))
        .json(&json!({ "servers": ["server1", "server2", "server3"], "weights": [0, 1, 0] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    for _ in 0..3 {
        let body: Value = app
            .client
            .post(app.url("/endpoints/llm/invocations"))
            .header("InputLocation", "s3://bucket/input.json")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["server"], "server2");
    }
}

#[tokio::test]
async fn test_pool_update_validation() {
    let app = common::spawn_app(common::test_config()).await;

    let bad = [
        json!({ "servers": ["a", "b"], "weights": [1, -1] }),
        json!({ "servers": ["a", "b"], "weights": [1] }),
        json!({ "servers": ["a"], "weights": [0] }),
        json!({ "servers": [], "weights": [] }),
    ];
    for body in bad {
        let res = app.client.put(app.url("/pool")).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", body);
    }

    let res = app
        .client
        .put(app.url("/pool"))
        .header("content-type", "application/json")
        .body("{\"servers\": [")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid JSON in request body");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = common::spawn_app(common::test_config()).await;

    let body = format!(
        "{{\"servers\": [\"{}\"], \"weights\": [1]}}",
        "a".repeat(capacity_router::http::server::MAX_BODY_BYTES)
    );
    let res = app
        .client
        .put(app.url("/pool"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // The stored pool is untouched.
    let res = app.client.get(app.url("/pool")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let pool: Value = res.json().await.unwrap();
    assert_eq!(pool["servers"], json!(["server1", "server2", "server3"]));
}

#[tokio::test]
async fn test_unroutable_stored_pool_is_server_error() {
    let app = common::spawn_app(common::test_config()).await;

    use capacity_router::pool::PoolRecord;
    use capacity_router::store::ConfigStore;
    app.store
        .put_pool(PoolRecord {
            id: "server_config".into(),
            servers: vec!["a".into(), "b".into()],
            weights: vec![1],
            current_instance_count: vec![],
        })
        .await
        .unwrap();

    let res = app
        .client
        .post(app.url("/endpoints/llm/invocations"))
        .header("InputLocation", "s3://bucket/input.json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "InvalidConfiguration");
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = common::spawn_app(common::test_config()).await;
    let body: Value = app.client.get(app.url("/status")).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "operational");
}
