pub mod health;
pub mod instance;
#[allow(clippy::module_inception)]
pub mod registry;
pub mod service;
pub mod strategy;


pub use health::HealthChecker;
pub use instance::{InstanceSnapshot, ServiceInstance};
pub use registry::{AcquireError, ServiceRegistry, ServiceStatus};
pub use service::GatewayService;
