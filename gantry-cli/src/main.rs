//! Gantry CLI Tool
//!
//! Command line interface for managing the Gantry gateway

use anyhow::Result;
use clap::{Parser, Subcommand};
use gantry_core::GatewayConfig;
use gantry_registry::{HealthChecker, ServiceRegistry};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gantry-cli")]
#[command(about = "A CLI tool for managing the Gantry gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "gantry.toml")]
        config: String,
    },
    /// Probe backend instances and report their health
    HealthCheck {
        /// Path to configuration file
        #[arg(short, long, default_value = "gantry.toml")]
        config: String,
        /// Specific service to check
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "gantry_example.toml")]
        output: String,
    },
    /// Show per-service status after one probe round
    Status {
        /// Path to configuration file
        #[arg(short, long, default_value = "gantry.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match load_and_validate(&config) {
                Ok(cfg) => {
                    let instance_count: usize =
                        cfg.services.values().map(|s| s.instances.len()).sum();
                    println!("✅ Configuration is valid");
                    println!("  - {} services configured", cfg.services.len());
                    println!("  - {} instances total", instance_count);
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::HealthCheck { config, service } => {
            println!("Performing health check...");
            let cfg = load_and_validate(&config)?;
            let registry = Arc::new(ServiceRegistry::from_config(&cfg)?);
            let checker = HealthChecker::new(registry.clone(), &cfg.settings)?;

            if let Some(service_name) = service {
                println!("Checking service: {}", service_name);
                if let Err(e) = checker.check_service(&service_name).await {
                    eprintln!("❌ Health check failed: {}", e);
                    std::process::exit(1);
                }
                print_service_statuses(&registry, Some(service_name.as_str()));
            } else {
                println!("Checking all services...");
                checker.check_all().await;
                print_service_statuses(&registry, None);
            }
            println!("✅ Health check completed");
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            generate_config_file(&output)?;
            println!("✅ Configuration file generated successfully");
        }
        Commands::Status { config } => {
            println!("Loading gateway status...");
            let cfg = load_and_validate(&config)?;
            show_gateway_status(cfg).await?;
        }
    }

    Ok(())
}

fn load_and_validate(path: &str) -> Result<GatewayConfig> {
    let config = gantry_core::load_config_from_path(path)?;
    config.validate()?;
    Ok(config)
}

/// 打印每个服务的实例健康明细
fn print_service_statuses(registry: &ServiceRegistry, only_service: Option<&str>) {
    let mut statuses: Vec<_> = registry.status_all().into_values().collect();
    statuses.sort_by(|a, b| a.service.cmp(&b.service));

    for status in statuses {
        if let Some(filter) = only_service {
            if status.service != filter {
                continue;
            }
        }

        println!();
        println!(
            "Service: {} ({}/{} healthy, strategy: {})",
            status.service, status.healthy_instances, status.total_instances, status.strategy
        );
        for instance in &status.instances {
            let marker = if instance.healthy { "🟢" } else { "🔴" };
            match instance.response_time_seconds {
                Some(latency) => println!(
                    "  {} {}:{} ({:.0}ms)",
                    marker,
                    instance.host,
                    instance.port,
                    latency * 1000.0
                ),
                None => println!("  {} {}:{}", marker, instance.host, instance.port),
            }
        }
    }
}

/// 执行一轮探测并展示整体状态
async fn show_gateway_status(config: GatewayConfig) -> Result<()> {
    let registry = Arc::new(ServiceRegistry::from_config(&config)?);
    let checker = HealthChecker::new(registry.clone(), &config.settings)?;
    checker.check_all().await;

    let statuses = registry.status_all();
    let total_services = statuses.len();
    let available_services = statuses
        .values()
        .filter(|s| s.healthy_instances > 0)
        .count();

    println!("📊 Gateway Status");
    println!("=================");
    println!("Total Services: {}", total_services);
    println!("Available Services: {}", available_services);
    println!(
        "Degraded Services: {}",
        total_services - available_services
    );

    print_service_statuses(&registry, None);
    Ok(())
}

/// 生成配置文件
fn generate_config_file(output_path: &str) -> Result<()> {
    let config_content = r#"# Gantry Gateway Configuration File

[settings]
health_check_interval_seconds = 30
health_check_timeout_seconds = 5
request_timeout_seconds = 30

# Service Configuration
# round_robin picks the least-connected healthy instance (random among ties)
[services.auth-service]
strategy = "round_robin"
health_check_path = "/health"

[[services.auth-service.instances]]
host = "10.0.1.10"
port = 8001

[[services.auth-service.instances]]
host = "10.0.1.11"
port = 8001

# Weighted selection: the weight-3 instance receives ~75% of the traffic
[services.report-service]
strategy = "weighted_round_robin"
health_check_path = "/health"

[[services.report-service.instances]]
host = "10.0.2.10"
port = 9000
weight = 3

[[services.report-service.instances]]
host = "10.0.2.11"
port = 9000
weight = 1

[services.rag-service]
strategy = "least_connections"
health_check_path = "/api/health"

[[services.rag-service.instances]]
host = "10.0.3.10"
port = 9100
metadata = { zone = "eu-west-1", gpu = "true" }
"#;

    std::fs::write(output_path, config_content)?;
    Ok(())
}
