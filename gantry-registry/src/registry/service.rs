use super::health::HealthChecker;
use super::registry::ServiceRegistry;
use anyhow::Result;
use gantry_core::GatewayConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// 网关服务
/// 整合服务注册表与健康检查器，负责周期性检查循环的生命周期
pub struct GatewayService {
    config: Arc<GatewayConfig>,
    registry: Arc<ServiceRegistry>,
    health_checker: Arc<HealthChecker>,
    is_running: Arc<RwLock<bool>>,
}

impl GatewayService {
    /// 创建新的网关服务
    pub fn new(config: GatewayConfig) -> Result<Self> {
        // 验证配置
        config.validate()?;

        let config = Arc::new(config);
        let registry = Arc::new(ServiceRegistry::from_config(&config)?);
        let health_checker = Arc::new(HealthChecker::new(registry.clone(), &config.settings)?);

        Ok(Self {
            config,
            registry,
            health_checker,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// 启动网关服务
    ///
    /// 先同步完成一轮探测再返回，保证启动后acquire读到的健康状态
    /// 已有依据；随后在后台按配置间隔循环探测。
    pub async fn start(&self) -> Result<()> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }

        info!("Starting gateway service");

        self.health_checker.check_all().await;

        let health_checker = self.health_checker.clone();
        let is_running = self.is_running.clone();
        let interval = Duration::from_secs(self.config.settings.health_check_interval_seconds);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                if !*is_running.read().await {
                    break;
                }

                health_checker.check_all().await;
            }
        });

        info!("Gateway service started successfully");
        Ok(())
    }

    /// 停止网关服务
    pub async fn stop(&self) {
        let mut running = self.is_running.write().await;
        *running = false;
        info!("Gateway service stopped");
    }

    /// 检查服务是否正在运行
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// 手动触发一轮健康检查
    pub async fn trigger_health_check(&self) {
        self.health_checker.check_all().await;
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }

    pub fn health_checker(&self) -> Arc<HealthChecker> {
        self.health_checker.clone()
    }

    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.clone()
    }
}
