use log::{error, info};
use retail_gateway::service::dashboard;
use retail_gateway::{AppConfig, StorageGateway};
use std::path::Path;
use std::process::ExitCode;

/// log4rs when its configuration file is present, env_logger otherwise
fn init_logging(config_file: &str) {
    if Path::new(config_file).exists() {
        match log4rs::init_file(config_file, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Failed to load log configuration {}: {}", config_file, e),
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.config_file);
    info!("Starting retail storage gateway");

    let gateway = match StorageGateway::connect(&config).await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Storage gateway initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = gateway.provisioning_report();
    for resource in &report.created {
        info!("created {}", resource);
    }
    for resource in &report.existing {
        info!("existing {}", resource);
    }

    match dashboard(&gateway).await {
        Ok(summary) => {
            info!(
                "Storage ready: {} customers, {} products, {} orders",
                summary.customer_count, summary.product_count, summary.order_count
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Storage check failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
