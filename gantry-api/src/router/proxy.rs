use crate::app::AppState;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;

/// 数据面入口：把/proxy/{service}/{*path}交给转发处理器
pub async fn forward(
    State(state): State<AppState>,
    Path((service, path)): Path<(String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .handler
        .handle(service, format!("/{path}"), method, headers, query, body)
        .await
}

/// 无子路径时转发到服务根路径
pub async fn forward_root(
    State(state): State<AppState>,
    Path(service): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .handler
        .handle(service, "/".to_string(), method, headers, query, body)
        .await
}
