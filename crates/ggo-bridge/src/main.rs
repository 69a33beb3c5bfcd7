mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ggo_bridge::config::DEFAULT_CONFIG_FILE;

// ============================================================================
// CLI Types
// ============================================================================

/// ggo-bridge - Green-GO intercom state bridge over OSC/UDP
#[derive(Parser, Debug)]
#[command(version = ggo_bridge::build_info::VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge, streaming host events on stdout and reading host commands on stdin
    Run {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Send a single command to the device and exit
    Send {
        /// Command name (sent to /ggo/cmd/<NAME>)
        #[arg(value_name = "NAME")]
        name: String,

        /// Integer arguments
        #[arg(value_name = "VALUES", required = true, allow_negative_numbers = true)]
        values: Vec<i32>,

        #[command(flatten)]
        device: DeviceArgs,
    },
}

/// Options shared by every command that talks to the device.
#[derive(Args, Debug)]
struct DeviceArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Device host (overrides config file)
    #[arg(long)]
    host: Option<String>,

    /// Device UDP port (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { device } => {
            commands::run::run(&device.config, device.host, device.port).await
        }
        Commands::Send {
            name,
            values,
            device,
        } => commands::send::run(&device.config, device.host, device.port, &name, values).await,
    }
}

/// Logs go to stderr; stdout carries the host event stream.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
