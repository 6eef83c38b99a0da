//! Gantry API网关
//!
//! 对外的HTTP面：状态接口、管理接口与/proxy数据面。

pub mod app;
pub mod router;

pub use app::{create_app, start_server, AppState};
