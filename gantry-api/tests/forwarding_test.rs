use axum::routing::{get, post};
use axum::Router;
use axum_test::TestServer;
use gantry_api::{create_app, AppState};
use gantry_core::{
    GatewayConfig, GlobalSettings, InstanceConfig, LoadBalanceStrategy, ServiceConfig,
};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// 启动一个本地上游，返回监听端口
async fn spawn_upstream(app: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// 创建测试配置：单服务，实例为(端口, 权重)列表
fn create_test_config(
    service: &str,
    ports: &[(u16, u32)],
    strategy: LoadBalanceStrategy,
) -> GatewayConfig {
    let mut services = HashMap::new();
    services.insert(
        service.to_string(),
        ServiceConfig {
            instances: ports
                .iter()
                .map(|(port, weight)| InstanceConfig {
                    host: "127.0.0.1".to_string(),
                    port: *port,
                    weight: *weight,
                    metadata: HashMap::new(),
                })
                .collect(),
            strategy,
            health_check_path: "/health".to_string(),
            scheme: "http".to_string(),
        },
    );

    GatewayConfig {
        services,
        settings: GlobalSettings {
            // 测试期间不需要后台周期检查来捣乱
            health_check_interval_seconds: 3600,
            health_check_timeout_seconds: 1,
            request_timeout_seconds: 1,
        },
    }
}

#[tokio::test]
async fn test_proxy_roundtrip_through_router() {
    let upstream = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/v1/emissions",
            get(|| async {
                (
                    [("x-upstream-service", "esg-data")],
                    axum::Json(serde_json::json!({"scope1": 1204.5})),
                )
            }),
        );
    let port = spawn_upstream(upstream).await;

    let config = create_test_config("esg-data", &[(port, 1)], LoadBalanceStrategy::RoundRobin);
    let state = AppState::from_config(config).await.unwrap();
    let server = TestServer::new(create_app(state)).unwrap();

    let response = server.get("/proxy/esg-data/v1/emissions").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("x-upstream-service"), "esg-data");

    let body: Value = response.json();
    assert_eq!(body["scope1"], 1204.5);
}

#[tokio::test]
async fn test_post_body_passes_through_unmodified() {
    let upstream = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/v1/reports",
            post(|body: axum::body::Bytes| async move {
                (axum::http::StatusCode::CREATED, body)
            }),
        );
    let port = spawn_upstream(upstream).await;

    let config = create_test_config("report-service", &[(port, 1)], LoadBalanceStrategy::Random);
    let state = AppState::from_config(config).await.unwrap();
    let server = TestServer::new(create_app(state)).unwrap();

    let payload = serde_json::json!({"framework": "tcfd", "year": 2025});
    let response = server
        .post("/proxy/report-service/v1/reports")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), 201);
    let echoed: Value = response.json();
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn test_unregistered_service_returns_404_without_upstream() {
    let config = GatewayConfig {
        services: HashMap::new(),
        settings: Default::default(),
    };
    let state = AppState::from_config(config).await.unwrap();
    let server = TestServer::new(create_app(state)).unwrap();

    let response = server.get("/proxy/ghost-service/anything").await;
    assert_eq!(response.status_code(), 404);

    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "NotFound");
    assert_eq!(body["error"]["status"], 404);
}

#[tokio::test]
async fn test_all_instances_unhealthy_returns_503_fast() {
    let port = spawn_upstream(Router::new().route("/health", get(|| async { "ok" }))).await;

    let config = create_test_config("svc", &[(port, 1)], LoadBalanceStrategy::LeastConnections);
    let state = AppState::from_config(config).await.unwrap();

    for instance in state.registry.instances("svc").unwrap() {
        instance.set_healthy(false);
    }

    let server = TestServer::new(create_app(state)).unwrap();

    // 不可用要从缓存的健康状态快速判定，而不是靠撞超时
    let started = std::time::Instant::now();
    let response = server.get("/proxy/svc/x").await;
    assert_eq!(response.status_code(), 503);
    assert!(started.elapsed() < Duration::from_millis(500));

    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "ServiceUnavailable");
}

#[tokio::test]
async fn test_upstream_timeout_returns_504_and_restores_counts() {
    let upstream = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
    let port = spawn_upstream(upstream).await;

    // request_timeout_seconds = 1，上游5秒后才应答
    let config = create_test_config("svc", &[(port, 1)], LoadBalanceStrategy::RoundRobin);
    let state = AppState::from_config(config).await.unwrap();
    let server = TestServer::new(create_app(state.clone())).unwrap();

    let response = server.get("/proxy/svc/slow").await;
    assert_eq!(response.status_code(), 504);

    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "GatewayTimeout");

    // 超时路径同样归还连接计数
    let status = state.registry.status("svc").unwrap();
    for snapshot in &status.instances {
        assert_eq!(snapshot.connection_count, 0);
    }
}

#[tokio::test]
async fn test_status_endpoints() {
    let port = spawn_upstream(Router::new().route("/health", get(|| async { "ok" }))).await;

    let config = create_test_config(
        "materiality-service",
        &[(port, 2)],
        LoadBalanceStrategy::WeightedRoundRobin,
    );
    let state = AppState::from_config(config).await.unwrap();
    let server = TestServer::new(create_app(state)).unwrap();

    let response = server.get("/status").await;
    assert_eq!(response.status_code(), 200);
    let all: Value = response.json();
    assert!(all.get("materiality-service").is_some());

    let response = server.get("/status/materiality-service").await;
    assert_eq!(response.status_code(), 200);
    let status: Value = response.json();
    assert_eq!(status["strategy"], "weighted_round_robin");
    assert_eq!(status["total_instances"], 1);
    assert_eq!(status["healthy_instances"], 1);
    assert_eq!(status["instances"][0]["weight"], 2);

    let response = server.get("/status/unknown-service").await;
    assert_eq!(response.status_code(), 404);
}
