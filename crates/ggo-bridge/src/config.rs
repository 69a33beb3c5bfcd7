use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::liveness::HEARTBEAT_VARIABLE;
use crate::registry::VariableRegistry;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "ggo-bridge.yaml";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: EndpointConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Variables the host knows about. Updates for other keys are dropped.
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,

    #[error("device {0} is not configured")]
    MissingEndpoint(&'static str),

    #[error("timing.{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl Config {
    /// Load configuration from a YAML file. A missing file yields defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        let config: Self = serde_saphyr::from_str(&expanded)?;
        config.timing.validate()?;
        Ok(config)
    }

    /// Build the variable registry, always including the heartbeat variable.
    pub fn registry(&self) -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        registry.define(HEARTBEAT_VARIABLE, "Heartbeat");
        for variable in &self.variables {
            registry.define(variable.key.clone(), variable.display_name());
        }
        registry
    }
}

// ============================================================================
// EndpointConfig
// ============================================================================

/// Where the device lives and which UDP port the session uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Device host name or address.
    #[serde(default)]
    pub host: String,
    /// UDP port shared by the device and the local socket.
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Overrides the local bind port (defaults to `port`).
    #[serde(default)]
    pub local_port: Option<u16>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            bind_address: default_bind_address(),
            local_port: None,
        }
    }
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port.unwrap_or(self.port)
    }

    /// Both the host and the port must be set before a session can open.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint("host"));
        }
        if self.port == 0 {
            return Err(ConfigError::MissingEndpoint("port"));
        }
        Ok(())
    }
}

// ============================================================================
// TimingConfig
// ============================================================================

/// Coalescing and liveness windows, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub debounce_ms: u64,
    pub flood_flush_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub sync_retry_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 5,
            flood_flush_ms: 250,
            heartbeat_timeout_ms: 5000,
            sync_retry_ms: 30_000,
        }
    }
}

impl TimingConfig {
    /// Liveness windows re-arm from their own expiry, so they cannot be zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("heartbeat_timeout_ms"));
        }
        if self.sync_retry_ms == 0 {
            return Err(ConfigError::ZeroDuration("sync_retry_ms"));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn flood_flush(&self) -> Duration {
        Duration::from_millis(self.flood_flush_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn sync_retry(&self) -> Duration {
        Duration::from_millis(self.sync_retry_ms)
    }
}

// ============================================================================
// VariableDefinition
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VariableDefinition {
    pub key: String,
    /// Display name shown by the host (defaults to the key).
    #[serde(default)]
    pub name: Option<String>,
}

impl VariableDefinition {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.key.clone())
    }
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}`, `${VAR:-default}` and `$$` in raw config text.
///
/// A `$` not followed by `{` or `$` is kept literally. Nested references
/// are not supported.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            result.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedVarReference)?;
            result.push_str(&resolve_var(&body[..end])?);
            rest = &body[end + 1..];
        } else {
            result.push('$');
            rest = after;
        }
    }

    result.push_str(rest);
    Ok(result)
}

fn resolve_var(reference: &str) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => default
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    // ========================================================================
    // Config Tests
    // ========================================================================

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.host, "");
        assert_eq!(config.device.port, 0);
        assert_eq!(config.device.bind_address.to_string(), "0.0.0.0");
        assert_eq!(config.timing.debounce_ms, 5);
        assert_eq!(config.timing.flood_flush_ms, 250);
        assert_eq!(config.timing.heartbeat_timeout_ms, 5000);
        assert_eq!(config.timing.sync_retry_ms, 30_000);
        assert!(config.variables.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let missing_path = tmp_dir.path().join("missing-config.yaml");
        let config = Config::load(&missing_path).await.unwrap();
        assert_eq!(config.device, EndpointConfig::default());
    }

    #[tokio::test]
    async fn test_load_valid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
device:
  host: "192.168.1.50"
  port: 8001
  local_port: 9001
timing:
  flood_flush_ms: 100
variables:
  - key: input_mute
    name: "Input mute"
  - key: mixbus_fader_ch3
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.device.host, "192.168.1.50");
        assert_eq!(config.device.port, 8001);
        assert_eq!(config.device.local_port(), 9001);
        assert_eq!(config.timing.flood_flush(), Duration::from_millis(100));
        assert_eq!(config.timing.debounce(), Duration::from_millis(5));
        assert_eq!(config.variables.len(), 2);
        assert_eq!(config.variables[1].display_name(), "mixbus_fader_ch3");
    }

    #[tokio::test]
    async fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "device: [not, a, map").unwrap();

        let result = Config::load(file.path()).await;
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_zero_liveness_windows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timing:\n  sync_retry_ms: 0").unwrap();

        match Config::load(file.path()).await {
            Err(ConfigError::ZeroDuration(field)) => assert_eq!(field, "sync_retry_ms"),
            other => panic!("expected ZeroDuration error, got {other:?}"),
        }

        let timing = TimingConfig {
            heartbeat_timeout_ms: 0,
            ..TimingConfig::default()
        };
        assert!(matches!(
            timing.validate(),
            Err(ConfigError::ZeroDuration("heartbeat_timeout_ms"))
        ));
        assert!(TimingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_registry_always_contains_heartbeat() {
        let config = Config {
            variables: vec![VariableDefinition {
                key: "input_mute".to_string(),
                name: Some("Input mute".to_string()),
            }],
            ..Config::default()
        };

        let registry = config.registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(HEARTBEAT_VARIABLE));
        assert_eq!(registry.get("input_mute").unwrap().name, "Input mute");
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(EndpointConfig::new("10.0.0.2", 8001).validate().is_ok());
        assert!(matches!(
            EndpointConfig::new("", 8001).validate(),
            Err(ConfigError::MissingEndpoint("host"))
        ));
        assert!(matches!(
            EndpointConfig::new("10.0.0.2", 0).validate(),
            Err(ConfigError::MissingEndpoint("port"))
        ));
    }

    #[test]
    fn test_local_port_defaults_to_shared_port() {
        let endpoint = EndpointConfig::new("10.0.0.2", 8001);
        assert_eq!(endpoint.local_port(), 8001);
    }

    // ========================================================================
    // Environment Variable Expansion Tests
    // ========================================================================

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "device:\n  host: 10.0.0.2";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_expand_env_vars_required_var() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("GGO_TEST_HOST_REQUIRED", "10.1.1.1") };
        let result = expand_env_vars("host: ${GGO_TEST_HOST_REQUIRED}").unwrap();
        assert_eq!(result, "host: 10.1.1.1");
        unsafe { std::env::remove_var("GGO_TEST_HOST_REQUIRED") };
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::remove_var("GGO_TEST_MISSING_12345") };
        match expand_env_vars("host: ${GGO_TEST_MISSING_12345}") {
            Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, "GGO_TEST_MISSING_12345"),
            other => panic!("expected MissingEnvVar error, got {other:?}"),
        }
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::remove_var("GGO_TEST_UNSET_PORT") };
        let result = expand_env_vars("port: ${GGO_TEST_UNSET_PORT:-8001}").unwrap();
        assert_eq!(result, "port: 8001");
    }

    #[test]
    fn test_expand_env_vars_with_empty_default() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::remove_var("GGO_TEST_UNSET_EMPTY") };
        let result = expand_env_vars("host: ${GGO_TEST_UNSET_EMPTY:-}").unwrap();
        assert_eq!(result, "host: ");
    }

    #[test]
    fn test_expand_env_vars_escaped_and_literal_dollar() {
        let result = expand_env_vars("a: $$100\nb: $50").unwrap();
        assert_eq!(result, "a: $100\nb: $50");
    }

    #[test]
    fn test_expand_env_vars_unclosed_brace() {
        assert!(matches!(
            expand_env_vars("host: ${GGO_UNCLOSED"),
            Err(ConfigError::UnclosedVarReference)
        ));
    }

    #[tokio::test]
    async fn test_config_load_with_env_var() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("GGO_TEST_DEVICE_HOST", "172.16.0.9") };

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
device:
  host: ${{GGO_TEST_DEVICE_HOST}}
  port: ${{GGO_TEST_DEVICE_PORT:-8001}}
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.device.host, "172.16.0.9");
        assert_eq!(config.device.port, 8001);

        unsafe { std::env::remove_var("GGO_TEST_DEVICE_HOST") };
    }
}
