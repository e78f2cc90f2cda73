//! aquatimer - bridge an Aqua Systems tap timer to an MQTT broker

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use aquatimer_ble::BleTimerTransport;
use aquatimer_cli::{cli::Cli, config::AppConfig, error::Result};
use aquatimer_mqtt::MqttMessageTransport;
use aquatimer_runtime::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", AppConfig::example_config()?);
        return Ok(());
    }

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration
    let mut config = load_configuration(&cli)?;
    config.apply_overrides(cli.device_id.as_deref(), cli.broker_url.as_deref());
    config.validate()?;

    // Build transports
    let device = Arc::new(BleTimerTransport::new(config.ble.clone()));
    let messages = Arc::new(MqttMessageTransport::connect(&config.mqtt)?);

    let supervisor = Supervisor::new(config.bridge.clone(), device, messages);
    let handle = supervisor.handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                handle.stop();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    supervisor.run().await?;

    info!("aquatimer exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        AppConfig::load_from_file(config_path)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::default())
    }
}
