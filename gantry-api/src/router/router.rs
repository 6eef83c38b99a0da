use super::{admin, health, proxy};
use crate::app::AppState;
use axum::routing::{any, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// 组装应用路由
pub fn create_app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health::gateway_health))
        .route("/status", get(health::status_all))
        .route("/status/{service}", get(health::status_one))
        .route("/admin/services", post(admin::register_service))
        .route("/admin/health-check", post(admin::trigger_health_check))
        .route("/proxy/{service}", any(proxy::forward_root))
        .route("/proxy/{service}/{*path}", any(proxy::forward))
        .layer(TraceLayer::new_for_http())
}

/// API信息
pub async fn index() -> &'static str {
    "Gantry - Load Balanced API Gateway"
}
