use super::types::{create_error_response, forward_error_response, ErrorType};
use crate::proxy::forwarder::{ForwardRequest, ProxyForwarder};
use axum::body::Body;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::sync::Arc;
use tracing::error;

/// 转发处理器
/// 把入站HTTP请求交给ProxyForwarder，并把归一化结果装配回响应
pub struct ForwardHandler {
    forwarder: Arc<ProxyForwarder>,
}

impl ForwardHandler {
    pub fn new(forwarder: Arc<ProxyForwarder>) -> Self {
        Self { forwarder }
    }

    pub async fn handle(
        &self,
        service: String,
        path: String,
        method: Method,
        headers: HeaderMap,
        query: Option<String>,
        body: Bytes,
    ) -> Response {
        let request = ForwardRequest {
            service,
            path,
            method,
            headers,
            query,
            body: if body.is_empty() { None } else { Some(body) },
            timeout: None,
        };

        match self.forwarder.forward(request).await {
            Ok(forwarded) => {
                let mut builder = Response::builder().status(forwarded.status);
                if let Some(headers) = builder.headers_mut() {
                    headers.extend(forwarded.headers);
                }

                match builder.body(Body::from(forwarded.body)) {
                    Ok(response) => response,
                    Err(e) => {
                        error!("Failed to assemble upstream response: {}", e);
                        create_error_response(
                            ErrorType::InternalServerError,
                            "Failed to assemble upstream response",
                            Some(e.to_string()),
                        )
                        .into_response()
                    }
                }
            }
            Err(e) => forward_error_response(&e),
        }
    }
}
