use super::instance::ServiceInstance;
use super::registry::ServiceRegistry;
use anyhow::Result;
use gantry_core::GlobalSettings;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// 健康检查器
///
/// 对每个已注册服务的每个实例发起带超时的GET探测，所有探测
/// 并发扇出，单个实例的失败不会中断其余实例的检查。结果直接
/// 写回实例状态，acquire读取的是缓存的健康位，从不现场探测。
pub struct HealthChecker {
    registry: Arc<ServiceRegistry>,
    client: Client,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(registry: Arc<ServiceRegistry>, settings: &GlobalSettings) -> Result<Self> {
        let probe_timeout = Duration::from_secs(settings.health_check_timeout_seconds);
        let client = Client::builder().timeout(probe_timeout).build()?;

        Ok(Self {
            registry,
            client,
            probe_timeout,
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// 对所有服务的所有实例执行一轮并发探测，全部完成后返回
    pub async fn check_all(&self) {
        let targets = self.registry.probe_targets();
        debug!("Starting health check round for {} instances", targets.len());

        let mut tasks = Vec::with_capacity(targets.len());
        for target in targets {
            let client = self.client.clone();
            tasks.push(tokio::spawn(async move {
                Self::probe_instance(&client, &target.service, &target.probe_url, &target.instance)
                    .await;
            }));
        }

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                error!("Health check task panicked: {}", e);
            }
        }

        debug!("Completed health check round");
    }

    /// 只探测一个服务的实例；服务未注册时报错
    pub async fn check_service(&self, service_name: &str) -> Result<()> {
        if !self.registry.is_registered(service_name) {
            anyhow::bail!("Service '{}' is not registered", service_name);
        }

        let targets: Vec<_> = self
            .registry
            .probe_targets()
            .into_iter()
            .filter(|t| t.service == service_name)
            .collect();

        let mut tasks = Vec::with_capacity(targets.len());
        for target in targets {
            let client = self.client.clone();
            tasks.push(tokio::spawn(async move {
                Self::probe_instance(&client, &target.service, &target.probe_url, &target.instance)
                    .await;
            }));
        }

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                error!("Health check task panicked: {}", e);
            }
        }

        Ok(())
    }

    /// 单次探测：2xx算成功，其余状态码、超时和连接错误都算失败。
    /// 失败只写回实例状态，不向上传播。
    async fn probe_instance(
        client: &Client,
        service: &str,
        probe_url: &str,
        instance: &Arc<ServiceInstance>,
    ) {
        let start = Instant::now();

        match client.get(probe_url).send().await {
            Ok(response) if response.status().is_success() => {
                let latency = start.elapsed();
                instance.record_probe_success(latency);
                debug!(
                    "Health check passed for service '{}' instance {} ({}ms)",
                    service,
                    instance.id(),
                    latency.as_millis()
                );
            }
            Ok(response) => {
                warn!(
                    "Health check failed for service '{}' instance {} with status: {}",
                    service,
                    instance.id(),
                    response.status()
                );
                instance.record_probe_failure();
            }
            Err(e) => {
                warn!(
                    "Health check error for service '{}' instance {}: {}",
                    service,
                    instance.id(),
                    e
                );
                instance.record_probe_failure();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use gantry_core::{GlobalSettings, InstanceConfig, LoadBalanceStrategy, ServiceConfig};
    use std::collections::HashMap;

    async fn spawn_upstream(app: Router) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        port
    }

    /// 绑定后立刻释放，得到一个（大概率）无人监听的端口
    async fn dead_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn local_instance(port: u16) -> InstanceConfig {
        InstanceConfig {
            host: "127.0.0.1".to_string(),
            port,
            weight: 1,
            metadata: HashMap::new(),
        }
    }

    fn test_settings() -> GlobalSettings {
        GlobalSettings {
            health_check_interval_seconds: 30,
            health_check_timeout_seconds: 2,
            request_timeout_seconds: 10,
        }
    }

    #[tokio::test]
    async fn test_check_all_updates_instance_state() {
        let healthy_port =
            spawn_upstream(Router::new().route("/health", get(|| async { "ok" }))).await;
        let failing_port = spawn_upstream(Router::new().route(
            "/health",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "down") }),
        ))
        .await;
        let unreachable_port = dead_port().await;

        let registry = Arc::new(ServiceRegistry::new());
        registry
            .register(
                "svc",
                &ServiceConfig {
                    instances: vec![
                        local_instance(healthy_port),
                        local_instance(failing_port),
                        local_instance(unreachable_port),
                    ],
                    strategy: LoadBalanceStrategy::RoundRobin,
                    health_check_path: "/health".to_string(),
                    scheme: "http".to_string(),
                },
            )
            .unwrap();

        let checker = HealthChecker::new(registry.clone(), &test_settings()).unwrap();
        checker.check_all().await;

        let status = registry.status("svc").unwrap();
        assert_eq!(status.total_instances, 3);
        assert_eq!(status.healthy_instances, 1);

        for snapshot in &status.instances {
            // 每个实例都被探测过，无论成功与否
            assert!(snapshot.last_health_check.is_some());
            if snapshot.port == healthy_port {
                assert!(snapshot.healthy);
                assert!(snapshot.response_time_seconds.is_some());
            } else {
                assert!(!snapshot.healthy);
                assert!(snapshot.response_time_seconds.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_recovered_instance_is_marked_healthy_again() {
        let port = spawn_upstream(Router::new().route("/health", get(|| async { "ok" }))).await;

        let registry = Arc::new(ServiceRegistry::new());
        registry
            .register(
                "svc",
                &ServiceConfig {
                    instances: vec![local_instance(port)],
                    strategy: LoadBalanceStrategy::RoundRobin,
                    health_check_path: "/health".to_string(),
                    scheme: "http".to_string(),
                },
            )
            .unwrap();

        // 人为标记为不健康，一轮探测之后应当恢复
        for target in registry.probe_targets() {
            target.instance.set_healthy(false);
        }
        assert!(registry.acquire("svc").is_err());

        let checker = HealthChecker::new(registry.clone(), &test_settings()).unwrap();
        checker.check_all().await;

        let acquired = registry.acquire("svc").unwrap();
        registry.release("svc", &acquired.id());
    }

    #[tokio::test]
    async fn test_check_service_rejects_unknown_service() {
        let registry = Arc::new(ServiceRegistry::new());
        let checker = HealthChecker::new(registry, &test_settings()).unwrap();

        let err = checker.check_service("missing").await.unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }
}
