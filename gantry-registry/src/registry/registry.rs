use super::instance::{InstanceSnapshot, ServiceInstance};
use super::strategy;
use anyhow::Result;
use gantry_core::{GatewayConfig, LoadBalanceStrategy, ServiceConfig};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// acquire的两类失败
///
/// NotRegistered是配置错误（路由不存在），调用方应视为硬失败；
/// Unavailable是正常的运行时结果（全部实例不健康），调用方通常
/// 映射为503并可稍后重试。两者必须区分处理。
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("service '{0}' is not registered")]
    NotRegistered(String),
    #[error("service '{0}' has no healthy instances available")]
    Unavailable(String),
}

/// 一个逻辑服务的注册信息；实例列表归注册独占所有
struct ServiceRegistration {
    name: String,
    instances: Vec<Arc<ServiceInstance>>,
    strategy: LoadBalanceStrategy,
    health_check_path: String,
    scheme: String,
}

/// 服务状态摘要，面向状态接口输出
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub strategy: String,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub instances: Vec<InstanceSnapshot>,
}

/// 健康检查的探测目标
pub(crate) struct ProbeTarget {
    pub service: String,
    pub probe_url: String,
    pub instance: Arc<ServiceInstance>,
}

/// 服务注册表
///
/// 持有服务名到注册信息的映射，中介所有实例查找。显式构造、
/// 以Arc注入使用，从不做成模块级单例，测试可以各自构造隔离
/// 的注册表。acquire是纯内存操作，不会阻塞在I/O上。
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceRegistration>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// 从配置批量注册所有服务
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let registry = Self::new();
        for (service_name, service_config) in &config.services {
            registry.register(service_name, service_config)?;
        }
        Ok(registry)
    }

    /// 注册（或整体替换）一个服务
    ///
    /// 空实例列表被拒绝。重复注册是全量替换而不是合并：旧实例
    /// 连同其运行时状态一起被丢弃。
    pub fn register(&self, service_name: &str, config: &ServiceConfig) -> Result<()> {
        if service_name.is_empty() || service_name.contains('/') || service_name.contains(' ') {
            anyhow::bail!("Invalid service name: '{}'", service_name);
        }

        config.validate(service_name)?;

        let instances: Vec<Arc<ServiceInstance>> = config
            .instances
            .iter()
            .map(|c| Arc::new(ServiceInstance::from_config(c)))
            .collect();

        let registration = ServiceRegistration {
            name: service_name.to_string(),
            instances,
            strategy: config.strategy,
            health_check_path: config.health_check_path.clone(),
            scheme: config.scheme.clone(),
        };

        let replaced = self
            .services
            .write()
            .insert(service_name.to_string(), registration)
            .is_some();

        if replaced {
            info!(
                "Re-registered service '{}' with {} instances (strategy: {})",
                service_name,
                config.instances.len(),
                config.strategy
            );
        } else {
            info!(
                "Registered service '{}' with {} instances (strategy: {})",
                service_name,
                config.instances.len(),
                config.strategy
            );
        }

        Ok(())
    }

    /// 为一次转发取得实例
    ///
    /// 成功时选中实例的连接数已经加一，调用方必须恰好release一次。
    pub fn acquire(&self, service_name: &str) -> Result<Arc<ServiceInstance>, AcquireError> {
        let services = self.services.read();

        let registration = services
            .get(service_name)
            .ok_or_else(|| AcquireError::NotRegistered(service_name.to_string()))?;

        match strategy::select(registration.strategy, &registration.instances) {
            Some(instance) => {
                let connections = instance.begin_request();
                debug!(
                    "Acquired instance {} for service '{}' ({} active connections)",
                    instance.id(),
                    service_name,
                    connections
                );
                Ok(instance)
            }
            None => {
                warn!(
                    "Service '{}' has no healthy instances ({} registered)",
                    service_name,
                    registration.instances.len()
                );
                Err(AcquireError::Unavailable(service_name.to_string()))
            }
        }
    }

    /// 归还实例的连接计数
    ///
    /// 对未知服务或未知实例是无害的空操作，从不失败。计数下限为0。
    pub fn release(&self, service_name: &str, instance_id: &str) {
        let services = self.services.read();

        let Some(registration) = services.get(service_name) else {
            debug!(
                "Ignoring release for unknown service '{}' (instance {})",
                service_name, instance_id
            );
            return;
        };

        match registration
            .instances
            .iter()
            .find(|i| i.id() == instance_id)
        {
            Some(instance) => {
                instance.end_request();
                debug!(
                    "Released instance {} for service '{}' ({} active connections)",
                    instance_id,
                    service_name,
                    instance.connection_count()
                );
            }
            None => {
                // 服务被重新注册后，在途请求归还的是已被替换的实例
                debug!(
                    "Ignoring release for unknown instance {} of service '{}'",
                    instance_id, service_name
                );
            }
        }
    }

    pub fn is_registered(&self, service_name: &str) -> bool {
        self.services.read().contains_key(service_name)
    }

    /// 服务的上游scheme；服务未注册时为None
    pub fn scheme(&self, service_name: &str) -> Option<String> {
        self.services
            .read()
            .get(service_name)
            .map(|r| r.scheme.clone())
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.read().keys().cloned().collect()
    }

    /// 服务当前持有的实例（Arc共享引用）
    pub fn instances(&self, service_name: &str) -> Option<Vec<Arc<ServiceInstance>>> {
        self.services
            .read()
            .get(service_name)
            .map(|r| r.instances.clone())
    }

    /// 单个服务的状态摘要
    pub fn status(&self, service_name: &str) -> Option<ServiceStatus> {
        self.services
            .read()
            .get(service_name)
            .map(Self::registration_status)
    }

    /// 所有服务的状态摘要
    pub fn status_all(&self) -> HashMap<String, ServiceStatus> {
        self.services
            .read()
            .values()
            .map(|r| (r.name.clone(), Self::registration_status(r)))
            .collect()
    }

    fn registration_status(registration: &ServiceRegistration) -> ServiceStatus {
        let instances: Vec<InstanceSnapshot> =
            registration.instances.iter().map(|i| i.snapshot()).collect();
        let healthy_instances = instances.iter().filter(|s| s.healthy).count();

        ServiceStatus {
            service: registration.name.clone(),
            strategy: registration.strategy.to_string(),
            total_instances: instances.len(),
            healthy_instances,
            instances,
        }
    }

    /// 当前全部探测目标的快照，供健康检查器做并发扇出
    pub(crate) fn probe_targets(&self) -> Vec<ProbeTarget> {
        let services = self.services.read();
        let mut targets = Vec::new();

        for registration in services.values() {
            for instance in &registration.instances {
                targets.push(ProbeTarget {
                    service: registration.name.clone(),
                    probe_url: format!(
                        "{}{}",
                        instance.url(&registration.scheme),
                        registration.health_check_path
                    ),
                    instance: instance.clone(),
                });
            }
        }

        targets
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
