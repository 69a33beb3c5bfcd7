use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use ggo_bridge::config::EndpointConfig;
use ggo_bridge::host::JsonLinesHost;
use ggo_bridge::transport::UdpConnector;
use ggo_bridge::{ActorConfig, BridgeActor, BridgeHandle};
use ggo_protocol::HostCommand;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = super::load_config(config_path, host, port).await?;

    info!(
        version = ggo_bridge::build_info::VERSION,
        host = %config.device.host,
        port = config.device.port,
        variables = config.variables.len(),
        "Starting ggo-bridge"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, actor_task) = BridgeActor::spawn(
        ActorConfig {
            registry: config.registry(),
            host: Arc::new(JsonLinesHost::stdout()),
            connector: Arc::new(UdpConnector),
            timing: config.timing.clone(),
        },
        shutdown_rx,
    );

    // A failed init is reported to the host; it can retry with `restart`.
    if let Err(e) = handle.init(config.device.clone()).await {
        warn!(error = %e, "Device session not started");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = serve_host(stdin, &handle, &config.device) => result?,
        _ = shutdown_signal() => info!("Shutdown signal received"),
    }

    if let Err(e) = handle.destroy().await {
        debug!(error = %e, "Bridge actor already stopped");
    }
    let _ = shutdown_tx.send(true);
    let _ = actor_task.await;

    info!("Bridge stopped");
    Ok(())
}

/// Read [`HostCommand`] JSON lines until EOF or `shutdown`.
async fn serve_host<R>(reader: R, handle: &BridgeHandle, endpoint: &EndpointConfig) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read host command")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command: HostCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring invalid host command");
                continue;
            }
        };

        if dispatch(handle, endpoint, command).await.is_break() {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    handle: &BridgeHandle,
    endpoint: &EndpointConfig,
    command: HostCommand,
) -> ControlFlow<()> {
    let result = match command {
        HostCommand::SendCommand { name, values } => handle.send_command(name, values).await,
        HostCommand::RequestSync => handle.request_sync().await,
        HostCommand::Restart => handle.init(endpoint.clone()).await,
        HostCommand::Close => handle.close().await,
        HostCommand::Shutdown => return ControlFlow::Break(()),
    };

    if let Err(e) = result {
        warn!(error = %e, "Host command failed");
    }
    ControlFlow::Continue(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
