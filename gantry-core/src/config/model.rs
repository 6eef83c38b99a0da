use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default)]
    pub settings: GlobalSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GlobalSettings {
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: u64,
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: default_health_check_interval(),
            health_check_timeout_seconds: default_health_check_timeout(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// 单个逻辑服务的配置：实例列表、负载均衡策略与健康检查路径
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    pub instances: Vec<InstanceConfig>,
    #[serde(default)]
    pub strategy: LoadBalanceStrategy,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstanceConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// 负载均衡策略
///
/// round_robin保留的是历史实现的可观测行为：在健康实例中
/// 取连接数最小者（并列时随机），而不是轮转游标。
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    RoundRobin,
    LeastConnections,
    Random,
    WeightedRoundRobin,
}

impl Default for LoadBalanceStrategy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

impl LoadBalanceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LeastConnections => "least_connections",
            Self::Random => "random",
            Self::WeightedRoundRobin => "weighted_round_robin",
        }
    }
}

impl std::fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Default value functions
fn default_health_check_interval() -> u64 {
    30
}

fn default_health_check_timeout() -> u64 {
    5 // 探测超时须明显短于请求超时
}

fn default_request_timeout() -> u64 {
    30
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_weight() -> u32 {
    1
}

impl GatewayConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        for (service_name, service) in &self.services {
            self.validate_service_config(service_name, service)?;
        }

        self.validate_settings()?;

        Ok(())
    }

    fn validate_service_config(&self, service_name: &str, service: &ServiceConfig) -> Result<()> {
        if service_name.is_empty() {
            anyhow::bail!("Service with empty name is not allowed");
        }

        if service_name.contains(' ') || service_name.contains('/') {
            anyhow::bail!(
                "Service '{}' has invalid name format (cannot contain spaces or '/')",
                service_name
            );
        }

        service.validate(service_name)
    }

    fn validate_settings(&self) -> Result<()> {
        if self.settings.health_check_interval_seconds == 0 {
            anyhow::bail!("Invalid health_check_interval_seconds: cannot be 0");
        }

        if self.settings.health_check_timeout_seconds == 0 {
            anyhow::bail!("Invalid health_check_timeout_seconds: cannot be 0");
        }

        if self.settings.request_timeout_seconds == 0 {
            anyhow::bail!("Invalid request_timeout_seconds: cannot be 0");
        }

        if self.settings.request_timeout_seconds > 300 {
            anyhow::bail!(
                "request_timeout_seconds too large: {} (maximum 300 seconds)",
                self.settings.request_timeout_seconds
            );
        }

        Ok(())
    }

    /// 获取指定服务的配置
    pub fn get_service(&self, service_name: &str) -> Option<&ServiceConfig> {
        self.services.get(service_name)
    }

    /// 获取所有已配置的服务名称
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

impl ServiceConfig {
    /// 验证单个服务配置；注册时同样适用，因此独立于GatewayConfig
    pub fn validate(&self, service_name: &str) -> Result<()> {
        if self.instances.is_empty() {
            anyhow::bail!("Service '{}' has no instances defined", service_name);
        }

        if self.scheme != "http" && self.scheme != "https" {
            anyhow::bail!(
                "Service '{}' has invalid scheme: '{}' (must be http or https)",
                service_name,
                self.scheme
            );
        }

        if !self.health_check_path.starts_with('/') {
            anyhow::bail!(
                "Service '{}' has invalid health_check_path: '{}' (must start with '/')",
                service_name,
                self.health_check_path
            );
        }

        let mut seen = std::collections::HashSet::new();
        for instance in &self.instances {
            if instance.host.is_empty() {
                anyhow::bail!("Service '{}' has instance with empty host", service_name);
            }

            if instance.port == 0 {
                anyhow::bail!(
                    "Service '{}' has instance '{}' with invalid port 0",
                    service_name,
                    instance.host
                );
            }

            // 零权重是允许的：weighted_round_robin对全零权重退化为随机选择
            if instance.weight > 1000 {
                anyhow::bail!(
                    "Service '{}' instance '{}:{}' has weight too large: {} (maximum 1000)",
                    service_name,
                    instance.host,
                    instance.port,
                    instance.weight
                );
            }

            if !seen.insert(format!("{}:{}", instance.host, instance.port)) {
                anyhow::bail!(
                    "Service '{}' has duplicate instance '{}:{}'",
                    service_name,
                    instance.host,
                    instance.port
                );
            }
        }

        Ok(())
    }
}
