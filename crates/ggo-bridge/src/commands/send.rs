use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use ggo_bridge::host::LogHost;
use ggo_bridge::transport::UdpConnector;
use ggo_bridge::{ActorConfig, BridgeActor};

/// Open a session, send one command, close.
pub async fn run(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
    name: &str,
    values: Vec<i32>,
) -> Result<()> {
    let config = super::load_config(config_path, host, port).await?;

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, actor_task) = BridgeActor::spawn(
        ActorConfig {
            registry: config.registry(),
            host: Arc::new(LogHost),
            connector: Arc::new(UdpConnector),
            timing: config.timing.clone(),
        },
        shutdown_rx,
    );

    handle
        .init(config.device.clone())
        .await
        .context("Failed to open device session")?;

    let sent = handle
        .send_command(name, values.clone())
        .await
        .with_context(|| format!("Failed to send command '{name}'"));

    handle.destroy().await?;
    let _ = actor_task.await;
    sent?;

    info!(command = %name, ?values, remote = %config.device.host, "Command sent");
    Ok(())
}
