//! Fleet Simulator CLI - thin wrapper over the simulation controller
//!
//! - `start` connects, starts every device and runs until Ctrl-C (or `--duration`)
//! - `stop` prints the status of a fresh, stopped controller; there is no
//!   daemon to signal, a running `start` ends with Ctrl-C or `--duration`
//! - `list` prints the device registry

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_simulator::{mqtt_controller, DeviceRegistry, SimulatorConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleet-simulator")]
#[command(about = "Simulated IoT device fleet publishing telemetry over MQTT")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and start publishing for every device
    Start {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Print the stopped status of this process's simulation.
    ///
    /// Does not reach a `start` running elsewhere; end that one with Ctrl-C or `--duration`.
    Stop,
    /// List the configured devices
    List {
        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleet_simulator=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SimulatorConfig::from_env().context("Invalid simulator configuration")?;

    match cli.command {
        Commands::Start { duration } => run(&config, duration).await,
        Commands::Stop => {
            let controller = mqtt_controller(&config).context("Failed to load device registry")?;
            controller.stop().await;
            print_status(&controller.status())
        }
        Commands::List { json } => {
            let registry = config.load_registry().context("Failed to load device registry")?;
            list(&registry, json)
        }
    }
}

async fn run(config: &SimulatorConfig, duration: Option<u64>) -> Result<()> {
    let controller = mqtt_controller(config).context("Failed to load device registry")?;

    info!("🚀 Fleet simulator starting ({} devices)", controller.devices().len());

    controller
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", config.mqtt.endpoint))?;
    controller.start().await.context("Failed to start simulation")?;

    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
        }
    }

    controller.disconnect().await;
    print_status(&controller.status())
}

fn list(registry: &DeviceRegistry, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::to_string_pretty(registry.devices())
            .context("Failed to serialize device registry")?;
        println!("{}", payload);
        return Ok(());
    }

    println!("{:<10} {:<16} {:>10}  {:<28} {}", "ID", "TYPE", "INTERVAL", "TOPIC", "NAME");
    for device in registry.devices() {
        println!(
            "{:<10} {:<16} {:>8}ms  {:<28} {}",
            device.id, device.device_type, device.publish_interval_ms, device.topic, device.name
        );
    }
    Ok(())
}

fn print_status(status: &fleet_simulator::SimulationStatus) -> Result<()> {
    let payload = serde_json::to_string_pretty(status).context("Failed to serialize status")?;
    println!("{}", payload);
    Ok(())
}
