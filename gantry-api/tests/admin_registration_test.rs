use axum::routing::get;
use axum::Router;
use axum_test::TestServer;
use gantry_api::{create_app, AppState};
use gantry_core::GatewayConfig;
use serde_json::{json, Value};
use std::collections::HashMap;

async fn spawn_upstream(app: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

async fn empty_gateway() -> (AppState, TestServer) {
    let config = GatewayConfig {
        services: HashMap::new(),
        settings: Default::default(),
    };
    let state = AppState::from_config(config).await.unwrap();
    let server = TestServer::new(create_app(state.clone())).unwrap();
    (state, server)
}

#[tokio::test]
async fn test_dynamic_registration_then_forward() {
    let port = spawn_upstream(
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/v1/lookup", get(|| async { "materiality" })),
    )
    .await;

    let (_state, server) = empty_gateway().await;

    let response = server
        .post("/admin/services")
        .json(&json!({
            "service": "materiality-service",
            "instances": [{"host": "127.0.0.1", "port": port}],
            "strategy": "least_connections",
        }))
        .await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    assert_eq!(body["status"], "registered");
    assert_eq!(body["instances"], 1);

    // 注册后立即可被转发，无需重启
    let response = server.get("/proxy/materiality-service/v1/lookup").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "materiality");

    let response = server.get("/status/materiality-service").await;
    assert_eq!(response.status_code(), 200);
    let status: Value = response.json();
    assert_eq!(status["strategy"], "least_connections");
}

#[tokio::test]
async fn test_registration_with_no_instances_is_rejected() {
    let (state, server) = empty_gateway().await;

    let response = server
        .post("/admin/services")
        .json(&json!({
            "service": "empty-service",
            "instances": [],
        }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "BadRequest");

    assert!(!state.registry.is_registered("empty-service"));
}

#[tokio::test]
async fn test_reregistration_replaces_previous_instances() {
    let old_port = spawn_upstream(
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/who", get(|| async { "old" })),
    )
    .await;
    let new_port = spawn_upstream(
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/who", get(|| async { "new" })),
    )
    .await;

    let (_state, server) = empty_gateway().await;

    for port in [old_port, new_port] {
        let response = server
            .post("/admin/services")
            .json(&json!({
                "service": "auth-service",
                "instances": [{"host": "127.0.0.1", "port": port}],
            }))
            .await;
        assert_eq!(response.status_code(), 201);
    }

    // 重复注册是整体替换：旧实例不再参与转发
    for _ in 0..10 {
        let response = server.get("/proxy/auth-service/who").await;
        assert_eq!(response.text(), "new");
    }
}
