//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};

use ggo_bridge::config::Config;

pub mod run;
pub mod send;

/// Load the config file and apply command-line endpoint overrides.
pub async fn load_config(path: &Path, host: Option<String>, port: Option<u16>) -> Result<Config> {
    let mut config = Config::load(path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(host) = host {
        config.device.host = host;
    }
    if let Some(port) = port {
        config.device.port = port;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn cli_overrides_take_precedence() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "device:\n  host: 10.0.0.2\n  port: 8001").unwrap();

        let config = load_config(file.path(), Some("10.0.0.9".to_string()), None)
            .await
            .unwrap();

        assert_eq!(config.device.host, "10.0.0.9");
        assert_eq!(config.device.port, 8001);
    }
}
