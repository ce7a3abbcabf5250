//! Senziio command line client
//!
//! Connects to the configured MQTT broker, asks one device for its info and
//! prints the answer as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use senziio::{load_config, DeviceInfo, Senziio, SenziioConfig, MANUFACTURER};
use senziio_mqtt::BrokerTransport;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "senziio", version, about = "Query a Senziio device for its info over MQTT")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "senziio.yaml")]
    config: PathBuf,

    /// Seconds to wait for the device to answer, overrides the config file
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Seconds to wait for the broker connection
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,
}

impl Cli {
    fn request_timeout(&self, config: &SenziioConfig) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.request_timeout())
    }
}

/// JSON document printed for a device that answered
fn report(config: &SenziioConfig, info: &DeviceInfo) -> serde_json::Value {
    serde_json::json!({
        "device_id": config.device.device_id,
        "name": config.device.display_name(),
        "manufacturer": MANUFACTURER,
        "model": info.model().unwrap_or(config.device.model.as_str()),
        "info": info,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let transport = Arc::new(BrokerTransport::connect(&config.mqtt));
    if !transport
        .wait_connected(Duration::from_secs(cli.connect_timeout))
        .await
    {
        bail!(
            "MQTT broker {}:{} is not available",
            config.mqtt.broker_host,
            config.mqtt.broker_port
        );
    }

    let device = Senziio::from_config(&config, transport.clone())?
        .with_timeout(cli.request_timeout(&config));

    info!(device = %device.identity(), "Requesting device info");
    let outcome = device.request_info().await;
    drop(device);

    if let Ok(transport) = Arc::try_unwrap(transport) {
        transport.shutdown().await;
    }

    match outcome.context("device info request failed")? {
        Some(info) => {
            println!("{}", serde_json::to_string_pretty(&report(&config, &info))?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!(device_id = %config.device.device_id, "No response from device");
            eprintln!(
                "{} did not answer within {:?}",
                config.device.display_name(),
                cli.request_timeout(&config)
            );
            Ok(ExitCode::from(2))
        }
    }
}
