use crate::config::model::GatewayConfig;
use anyhow::Context;

/// 配置文件路径：优先CONFIG_PATH环境变量，否则使用默认路径
pub fn get_config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "gantry.toml".to_string())
}

pub fn load_config() -> Result<GatewayConfig, anyhow::Error> {
    load_config_from_path(&get_config_path())
}

pub fn load_config_from_path(config_path: &str) -> Result<GatewayConfig, anyhow::Error> {
    let config_str = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {config_path}"))?;
    let config: GatewayConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {config_path}"))?;
    Ok(config)
}
