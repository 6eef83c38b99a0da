use crate::router::router::create_app_router;
use anyhow::Result;
use axum::Router;
use gantry_core::{load_config, GatewayConfig};
use gantry_proxy::{ForwardHandler, ProxyForwarder};
use gantry_registry::{GatewayService, ServiceRegistry};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 应用状态，持有注册表与转发器
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub gateway: Arc<GatewayService>,
    pub registry: Arc<ServiceRegistry>,
    pub handler: Arc<ForwardHandler>,
}

impl AppState {
    /// 创建新的应用状态
    pub async fn new() -> Result<Self> {
        let config = load_config()?;
        let config_path = gantry_core::get_config_path();
        info!("Configuration loaded successfully from: {}", config_path);

        Self::from_config(config).await
    }

    /// 从给定配置构建应用状态
    ///
    /// 注册表按配置显式构造并注入，不经过任何全局单例；测试用
    /// 本方法获得相互隔离的网关实例。
    pub async fn from_config(config: GatewayConfig) -> Result<Self> {
        let gateway = Arc::new(GatewayService::new(config.clone())?);
        gateway.start().await?;
        info!("Gateway service started");

        let registry = gateway.registry();
        let forwarder = Arc::new(ProxyForwarder::new(registry.clone(), &config.settings)?);
        let handler = Arc::new(ForwardHandler::new(forwarder));

        Ok(Self {
            config: Arc::new(config),
            gateway,
            registry,
            handler,
        })
    }

    /// 停止应用
    pub async fn shutdown(&self) {
        info!("Shutting down application...");
        self.gateway.stop().await;
        info!("Application shutdown complete");
    }
}

/// 创建应用路由
pub fn create_app(state: AppState) -> Router {
    create_app_router().with_state(state)
}

/// 启动网关服务器
pub async fn start_server() -> Result<()> {
    // 初始化日志 - 完全依赖RUST_LOG环境变量
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Gantry gateway...");

    let config_path = gantry_core::get_config_path();
    info!("Configuration file: {}", config_path);

    let app_state = match AppState::new().await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            return Err(e);
        }
    };

    let app = create_app(app_state.clone());

    let bind_addr = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("Gateway listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /                     - API information");
    info!("  GET  /health               - Gateway health");
    info!("  GET  /status               - Status of every service");
    info!("  GET  /status/{{service}}     - Status of one service");
    info!("  POST /admin/services       - Register or replace a service");
    info!("  POST /admin/health-check   - Trigger a health check round");
    info!("  ANY  /proxy/{{service}}/...  - Forward to a backend instance");

    // 设置优雅关闭
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
        }
        info!("Shutdown signal received");
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

    if let Err(e) = server.await {
        error!("Server error: {}", e);
        app_state.shutdown().await;
        return Err(e.into());
    }

    app_state.shutdown().await;
    Ok(())
}
