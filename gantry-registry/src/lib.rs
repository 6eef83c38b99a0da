//! Gantry服务注册与负载均衡库
//!
//! 维护逻辑服务到后端实例集合的映射，提供实例选择、连接计数
//! 与并发健康检查。转发层只通过acquire/release两个调用消费本库。

pub mod registry;

pub use registry::health::HealthChecker;
pub use registry::instance::{InstanceSnapshot, ServiceInstance};
pub use registry::registry::{AcquireError, ServiceRegistry, ServiceStatus};
pub use registry::service::GatewayService;
pub use registry::strategy;
