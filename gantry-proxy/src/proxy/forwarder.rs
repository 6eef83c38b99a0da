use bytes::Bytes;
use gantry_core::GlobalSettings;
use gantry_registry::{AcquireError, ServiceRegistry};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

/// 不透传给上游的请求头；其余头（包括authorization）原样转发
const HOP_HEADERS: [&str; 6] = [
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
];

/// 转发失败的类型化结果
///
/// 调用方按类别映射HTTP状态：NotRegistered是配置错误，
/// Unavailable/Unreachable是503/502类，Timeout是504类，
/// Internal是500类且始终带原因记入日志，绝不静默吞掉。
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("service '{0}' is not registered")]
    ServiceNotRegistered(String),
    #[error("service '{0}' has no healthy instances available")]
    ServiceUnavailable(String),
    #[error("upstream request to {target_url} timed out")]
    UpstreamTimeout {
        service: String,
        target_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream {target_url} is unreachable")]
    UpstreamUnreachable {
        service: String,
        target_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("forwarding for service '{service}' failed: {cause}")]
    Internal { service: String, cause: anyhow::Error },
}

/// 一次转发的输入
///
/// multipart上传无需重新编码：调用方传入的body字节连同原始
/// Content-Type边界一起原样透传。
pub struct ForwardRequest {
    pub service: String,
    pub path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Option<Bytes>,
    /// 为None时使用转发器的默认请求超时
    pub timeout: Option<Duration>,
}

/// 转发成功后的归一化结果，暴露给调用层的全部信息面
#[derive(Debug)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub service: String,
    pub target_url: String,
    pub instance_id: String,
    pub elapsed: Duration,
}

/// 请求转发器
///
/// 每次转发经过固定的阶段：取实例 → 转发 → 结果归类 → 归还。
/// 归还在每条退出路径上恰好执行一次；核心不做重试，重试是
/// 调用层在单次转发之上的叠加。
pub struct ProxyForwarder {
    registry: Arc<ServiceRegistry>,
    client: Client,
    default_timeout: Duration,
}

impl ProxyForwarder {
    pub fn new(registry: Arc<ServiceRegistry>, settings: &GlobalSettings) -> anyhow::Result<Self> {
        // 总超时逐请求设置，客户端本身不限时
        let client = Client::builder().build()?;

        Ok(Self {
            registry,
            client,
            default_timeout: Duration::from_secs(settings.request_timeout_seconds),
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 转发一次入站请求
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ForwardError> {
        // 取实例失败时快速返回：不发起下游调用，不占用连接配额
        let instance = match self.registry.acquire(&request.service) {
            Ok(instance) => instance,
            Err(AcquireError::NotRegistered(name)) => {
                warn!("Refusing to forward to unregistered service '{}'", name);
                return Err(ForwardError::ServiceNotRegistered(name));
            }
            Err(AcquireError::Unavailable(name)) => {
                warn!(
                    "Refusing to forward to service '{}': no healthy instances",
                    name
                );
                return Err(ForwardError::ServiceUnavailable(name));
            }
        };

        let scheme = self
            .registry
            .scheme(&request.service)
            .unwrap_or_else(|| "http".to_string());
        let target_url =
            build_target_url(&instance.url(&scheme), &request.path, request.query.as_deref());
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        debug!(
            "Forwarding {} {} for service '{}' to {}",
            request.method, request.path, request.service, target_url
        );

        let started = Instant::now();
        let outcome = self.send_upstream(&request, &target_url, timeout).await;

        // 无论成功、下游错误还是超时，都恰好归还一次连接计数
        self.registry.release(&request.service, &instance.id());
        let elapsed = started.elapsed();

        match outcome {
            Ok((status, headers, body)) => {
                debug!(
                    "Forwarded {} {} to {} -> {} in {}ms",
                    request.method,
                    request.path,
                    target_url,
                    status,
                    elapsed.as_millis()
                );

                Ok(ForwardResponse {
                    status,
                    headers,
                    body,
                    service: request.service,
                    target_url,
                    instance_id: instance.id(),
                    elapsed,
                })
            }
            Err(e) => Err(self.classify_error(&request.service, &target_url, elapsed, e)),
        }
    }

    async fn send_upstream(
        &self,
        request: &ForwardRequest,
        target_url: &str,
        timeout: Duration,
    ) -> Result<(StatusCode, HeaderMap, Bytes), reqwest::Error> {
        let headers = strip_hop_headers(&request.headers);

        let mut builder = self
            .client
            .request(request.method.clone(), target_url)
            .headers(headers)
            .timeout(timeout);

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        // 逐跳头在响应方向同样剥掉，响应体由网关重新成帧
        let headers = strip_hop_headers(response.headers());
        let body = response.bytes().await?;

        Ok((status, headers, body))
    }

    /// 传输层失败到网关错误的归类
    fn classify_error(
        &self,
        service: &str,
        target_url: &str,
        elapsed: Duration,
        error: reqwest::Error,
    ) -> ForwardError {
        if error.is_timeout() {
            warn!(
                "Upstream timeout for service '{}' at {} after {}ms",
                service,
                target_url,
                elapsed.as_millis()
            );
            ForwardError::UpstreamTimeout {
                service: service.to_string(),
                target_url: target_url.to_string(),
                source: error,
            }
        } else if error.is_connect() {
            warn!(
                "Upstream unreachable for service '{}' at {}: {}",
                service, target_url, error
            );
            ForwardError::UpstreamUnreachable {
                service: service.to_string(),
                target_url: target_url.to_string(),
                source: error,
            }
        } else {
            error!(
                "Unexpected forwarding error for service '{}' at {}: {}",
                service, target_url, error
            );
            ForwardError::Internal {
                service: service.to_string(),
                cause: error.into(),
            }
        }
    }
}

fn build_target_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    };

    if let Some(query) = query {
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
    }

    url
}

fn strip_hop_headers(headers: &HeaderMap) -> HeaderMap {
    let mut stripped = headers.clone();
    for name in HOP_HEADERS {
        stripped.remove(name);
    }
    stripped
}
