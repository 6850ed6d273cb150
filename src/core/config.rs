//! Configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::panel::WidgetKind;

/// Gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Gateway host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Gateway WebSocket port
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket path on the gateway
    #[serde(default = "default_path")]
    pub path: String,
    /// Reconnect after the session closes
    #[serde(default)]
    pub reconnect: bool,
    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8888
}
fn default_path() -> String {
    "/ws".to_string()
}
fn default_reconnect_initial() -> u64 {
    500
}
fn default_reconnect_max() -> u64 {
    5000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            reconnect: false,
            reconnect_initial_ms: default_reconnect_initial(),
            reconnect_max_ms: default_reconnect_max(),
        }
    }
}

impl ConnectionConfig {
    /// WebSocket URL of the gateway endpoint
    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}:{}{}", self.host, self.port, path)
    }
}

/// Heartbeat watchdog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Watchdog check interval in milliseconds
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_ms: u64,
    /// Heartbeat silence before the watchdog probes, in milliseconds
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
}

fn default_watchdog_interval() -> u64 {
    5000
}
fn default_heartbeat_timeout() -> u64 {
    10000
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: default_watchdog_interval(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
        }
    }
}

impl LivenessConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms.max(1))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

/// Panel (widget layer) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Pulse button re-sync interval in milliseconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,
}

fn default_refresh_interval() -> u64 {
    1000
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval(),
        }
    }
}

/// Subscription bootstrap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// File sent verbatim as the first frame after connecting
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SubscriptionConfig {
    /// Read the subscription blob, if one is configured.
    pub fn load_blob(&self) -> Result<Option<String>> {
        match &self.path {
            Some(path) => {
                let blob = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read subscription file: {:?}", path))?;
                Ok(Some(blob))
            }
            None => Ok(None),
        }
    }
}

/// One widget on the panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub kind: WidgetKind,
    #[serde(default)]
    pub label: String,
    /// Channel driven by the widget
    #[serde(default)]
    pub channel: Option<u16>,
    /// Signal shown by the widget
    #[serde(default)]
    pub signal: Option<u16>,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    /// Panel layout
    #[serde(default, rename = "widget", skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<WidgetConfig>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, falling back to defaults if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Write the embedded default configuration to `config_path`
    pub fn write_default(config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(config_path, Self::default_config_str())
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "mfdpanel", "MfdPanel")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.port, 8888);
        assert_eq!(config.connection.path, "/ws");
        assert!(!config.connection.reconnect);
        assert_eq!(config.liveness.watchdog_interval_ms, 5000);
        assert_eq!(config.liveness.heartbeat_timeout_ms, 10000);
        assert_eq!(config.panel.refresh_interval_ms, 1000);
        assert!(config.subscription.path.is_none());
        assert!(config.widgets.is_empty());
    }

    #[test]
    fn test_embedded_default_matches_defaults() {
        let parsed: Config = toml::from_str(Config::default_config_str()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.connection.url(), defaults.connection.url());
        assert_eq!(parsed.liveness.heartbeat_timeout_ms, defaults.liveness.heartbeat_timeout_ms);
        assert_eq!(parsed.panel.refresh_interval_ms, defaults.panel.refresh_interval_ms);
    }

    #[test]
    fn test_url() {
        let mut conn = ConnectionConfig::default();
        assert_eq!(conn.url(), "ws://127.0.0.1:8888/ws");
        conn.host = "panel.local".to_string();
        conn.path = "gateway".to_string();
        assert_eq!(conn.url(), "ws://panel.local:8888/gateway");
    }

    #[test]
    fn test_widgets_parse() {
        let toml_str = r#"
            [connection]
            port = 9000

            [[widget]]
            kind = "pulse"
            label = "Beacon"
            channel = 12
            signal = 5

            [[widget]]
            kind = "slider"
            channel = 3
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connection.port, 9000);
        assert_eq!(config.connection.host, "127.0.0.1");
        assert_eq!(config.widgets.len(), 2);
        assert_eq!(config.widgets[0].kind, WidgetKind::Pulse);
        assert_eq!(config.widgets[0].signal, Some(5));
        assert_eq!(config.widgets[1].kind, WidgetKind::Slider);
        assert_eq!(config.widgets[1].signal, None);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.connection.port, config.connection.port);
    }

    #[test]
    fn test_load_missing_and_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.connection.port, 8888);

        Config::write_default(&path).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.liveness.watchdog_interval_ms, 5000);
    }

    #[test]
    fn test_subscription_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub.json");
        std::fs::write(&path, r#"{"messagetype":96,"messagecmd":0,"size":2,"data":[5,0]}"#).unwrap();

        let sub = SubscriptionConfig { path: Some(path) };
        let blob = sub.load_blob().unwrap().unwrap();
        assert!(blob.starts_with('{'));

        let none = SubscriptionConfig::default();
        assert!(none.load_blob().unwrap().is_none());

        let missing = SubscriptionConfig { path: Some(dir.path().join("nope.json")) };
        assert!(missing.load_blob().is_err());
    }
}
