use crate::proxy::forwarder::ForwardError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// 错误类型枚举，用于确定HTTP状态码
#[derive(Debug, Clone)]
pub enum ErrorType {
    /// 客户端错误 - 400 Bad Request
    BadRequest,
    /// 路由不存在 - 404 Not Found
    NotFound,
    /// 服务不可用或上游不可达 - 503 Service Unavailable
    ServiceUnavailable,
    /// 网关超时 - 504 Gateway Timeout
    GatewayTimeout,
    /// 服务器内部错误 - 500 Internal Server Error
    InternalServerError,
}

impl ErrorType {
    /// 获取对应的HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorType::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 创建带有正确HTTP状态码的错误响应
pub fn create_error_response(
    error_type: ErrorType,
    message: &str,
    details: Option<String>,
) -> impl IntoResponse {
    let status_code = error_type.status_code();
    let error_json = json!({
        "error": {
            "message": message,
            "type": format!("{:?}", error_type),
            "status": status_code.as_u16(),
            "details": details,
        }
    });

    (status_code, Json(error_json))
}

/// 将转发错误映射为网关响应
///
/// NotRegistered是配置性404；Unavailable和上游不可达映射503，
/// 调用方可稍后重试；超时是504；其余意外错误一律500并带原因
/// 写日志。
pub fn forward_error_response(error: &ForwardError) -> axum::response::Response {
    let (error_type, details) = match error {
        ForwardError::ServiceNotRegistered(_) => (ErrorType::NotFound, None),
        ForwardError::ServiceUnavailable(_) => (ErrorType::ServiceUnavailable, None),
        ForwardError::UpstreamTimeout { source, .. } => {
            (ErrorType::GatewayTimeout, Some(source.to_string()))
        }
        ForwardError::UpstreamUnreachable { source, .. } => {
            (ErrorType::ServiceUnavailable, Some(source.to_string()))
        }
        ForwardError::Internal { service, cause } => {
            tracing::error!(
                "Internal forwarding error for service '{}': {:#}",
                service,
                cause
            );
            (ErrorType::InternalServerError, Some(cause.to_string()))
        }
    };

    create_error_response(error_type, &error.to_string(), details).into_response()
}
