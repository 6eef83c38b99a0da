//! Gantry转发库
//!
//! 消费服务注册表：取实例、把入站请求原样转发到选中的后端、
//! 把传输层失败映射为网关侧的类型化错误并记录连接与延迟。

pub mod proxy;

pub use proxy::forwarder::{ForwardError, ForwardRequest, ForwardResponse, ProxyForwarder};
pub use proxy::handler::forward::ForwardHandler;
pub use proxy::handler::types::{create_error_response, forward_error_response, ErrorType};
