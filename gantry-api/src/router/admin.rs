use crate::app::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_core::ServiceConfig;
use gantry_proxy::{create_error_response, ErrorType};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterServiceRequest {
    pub service: String,
    #[serde(flatten)]
    pub config: ServiceConfig,
}

/// 动态注册（或整体替换）一个服务
pub async fn register_service(
    State(state): State<AppState>,
    Json(request): Json<RegisterServiceRequest>,
) -> Response {
    match state.registry.register(&request.service, &request.config) {
        Ok(()) => {
            info!("Service '{}' registered via admin API", request.service);
            (
                StatusCode::CREATED,
                Json(json!({
                    "status": "registered",
                    "service": request.service,
                    "instances": request.config.instances.len(),
                })),
            )
                .into_response()
        }
        Err(e) => create_error_response(
            ErrorType::BadRequest,
            &format!("Invalid service registration: {e}"),
            None,
        )
        .into_response(),
    }
}

/// 手动触发一轮健康检查；全部探测完成后返回
pub async fn trigger_health_check(State(state): State<AppState>) -> impl IntoResponse {
    state.gateway.trigger_health_check().await;
    Json(json!({ "status": "completed" }))
}
