use anyhow::Result;
use clap::Command;
use hcp_frontend::{bootstrap::Frontend, build_api_server_from_env, config::AppConfig};
use hcp_observability::{TracingConfig, setup_tracing};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _matches = Command::new("hcp-frontend")
        .about("Hosted control plane resource provider frontend")
        .version(env!("CARGO_PKG_VERSION"))
        .get_matches();

    let observability = AppConfig::load_from_env()?.observability();
    setup_tracing(TracingConfig {
        service_name: "hcp-frontend".to_string(),
        log_level: observability.log_level,
        format: observability.format,
    })?;

    info!("Loading configuration from environment variables...");
    let Frontend { server, metrics } = build_api_server_from_env().await?;

    info!("Starting HCP frontend API server...");
    let result = server.serve().await;
    metrics.shutdown();
    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
