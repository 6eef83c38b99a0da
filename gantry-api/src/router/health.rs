use crate::app::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_proxy::{create_error_response, ErrorType};
use serde_json::json;

/// 网关自身健康：进程在运行，且至少一个服务还有可用实例。
/// 已知的不可用要快速暴露出去，而不是等调用方撞上超时。
pub async fn gateway_health(State(state): State<AppState>) -> impl IntoResponse {
    let statuses = state.registry.status_all();
    let total_services = statuses.len();
    let available_services = statuses
        .values()
        .filter(|s| s.healthy_instances > 0)
        .count();
    let is_running = state.gateway.is_running().await;

    let healthy = is_running && (total_services == 0 || available_services > 0);
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "running": is_running,
            "services": {
                "total": total_services,
                "available": available_services,
            },
        })),
    )
}

/// 所有服务的状态摘要
pub async fn status_all(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.status_all())
}

/// 单个服务的状态摘要
pub async fn status_one(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Response {
    match state.registry.status(&service) {
        Some(status) => Json(status).into_response(),
        None => create_error_response(
            ErrorType::NotFound,
            &format!("Service '{service}' is not registered"),
            None,
        )
        .into_response(),
    }
}
