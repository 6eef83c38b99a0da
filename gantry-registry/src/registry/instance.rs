use chrono::{DateTime, Utc};
use gantry_core::InstanceConfig;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// 单个后端实例
///
/// 静态部分（host/port/weight/metadata）在注册时确定；运行时状态
/// （健康、连接数、延迟、最近检查时间）由健康检查器和转发器更新。
/// 实例以Arc共享，连接计数使用原子整数，acquire/release可以与
/// 健康检查并发执行而不丢失更新。
pub struct ServiceInstance {
    host: String,
    port: u16,
    weight: u32,
    metadata: HashMap<String, String>,
    healthy: AtomicBool,
    connection_count: AtomicU32,
    response_time: RwLock<Option<Duration>>,
    last_health_check: RwLock<Option<DateTime<Utc>>>,
}

/// 实例状态的不可变视图，用于状态上报
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub metadata: HashMap<String, String>,
    pub healthy: bool,
    pub connection_count: u32,
    pub response_time_seconds: Option<f64>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ServiceInstance {
    pub fn new(host: String, port: u16, weight: u32, metadata: HashMap<String, String>) -> Self {
        Self {
            host,
            port,
            weight,
            metadata,
            // 新注册的实例默认健康，首轮探测前即可参与选择
            healthy: AtomicBool::new(true),
            connection_count: AtomicU32::new(0),
            response_time: RwLock::new(None),
            last_health_check: RwLock::new(None),
        }
    }

    pub fn from_config(config: &InstanceConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.weight,
            config.metadata.clone(),
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// 实例标识：host:port，在一次注册内唯一
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 拼接实例基地址；scheme由调用方上下文决定（明文或加密传输）
    pub fn url(&self, scheme: &str) -> String {
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn connection_count(&self) -> u32 {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// acquire时调用，返回递增后的连接数
    pub fn begin_request(&self) -> u32 {
        self.connection_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// release时调用；计数下限为0，多余的release不会下溢
    pub fn end_request(&self) {
        let _ = self
            .connection_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
    }

    /// 探测成功：标记健康并记录观测延迟
    pub fn record_probe_success(&self, latency: Duration) {
        self.healthy.store(true, Ordering::Relaxed);
        *self.response_time.write() = Some(latency);
        *self.last_health_check.write() = Some(Utc::now());
    }

    /// 探测失败：标记不健康，保留上一次的延迟观测值
    pub fn record_probe_failure(&self) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.last_health_check.write() = Some(Utc::now());
    }

    pub fn response_time(&self) -> Option<Duration> {
        *self.response_time.read()
    }

    pub fn last_health_check(&self) -> Option<DateTime<Utc>> {
        *self.last_health_check.read()
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            host: self.host.clone(),
            port: self.port,
            weight: self.weight,
            metadata: self.metadata.clone(),
            healthy: self.is_healthy(),
            connection_count: self.connection_count(),
            response_time_seconds: self.response_time().map(|d| d.as_secs_f64()),
            last_health_check: self.last_health_check(),
        }
    }
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("weight", &self.weight)
            .field("healthy", &self.is_healthy())
            .field("connection_count", &self.connection_count())
            .finish()
    }
}
