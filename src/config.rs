//! Application-level configuration loading: HTTP port, dartboard link and storage.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DARTBOARD_BACK_CONFIG_PATH";
/// Environment variable that overrides the configured port.
const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listening port.
    pub port: u16,
    /// Serial device of the dartboard.
    pub serial_port: String,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// JSON snapshot file.
    pub database_path: PathBuf,
    /// Wait before reconnecting after an open link closed.
    pub reconnect_after_close_ms: u64,
    /// Wait before retrying after the port failed to open.
    pub reconnect_after_failure_ms: u64,
    /// Wait before the first connection attempt.
    pub initial_connect_delay_ms: u64,
    /// Let matches start without a connected board.
    pub allow_start_without_board: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            serial_port: "/dev/ttyACM0".into(),
            baud_rate: 115_200,
            database_path: PathBuf::from("database.json"),
            reconnect_after_close_ms: 5_000,
            reconnect_after_failure_ms: 10_000,
            initial_connect_delay_ms: 1_000,
            allow_start_without_board: false,
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    ///
    /// Missing keys take their default value. `PORT` overrides the port.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|err| {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse config; falling back to defaults"
                );
                Self::default()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        let config = config.with_port_override(env::var(PORT_ENV).ok().as_deref());
        info!(
            port = config.port,
            serial_port = %config.serial_port,
            baud_rate = config.baud_rate,
            database = %config.database_path.display(),
            "configuration loaded"
        );
        config
    }

    fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    fn with_port_override(mut self, value: Option<&str>) -> Self {
        if let Some(value) = value {
            match value.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(err) => warn!(%value, error = %err, "ignoring invalid {PORT_ENV}"),
            }
        }
        self
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config =
            AppConfig::parse(r#"{"serial_port": "/dev/ttyUSB0", "allow_start_without_board": true}"#)
                .unwrap();
        assert_eq!(config.serial_port, "/dev/ttyUSB0");
        assert!(config.allow_start_without_board);
        assert_eq!(config.port, 3000);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.reconnect_after_failure_ms, 10_000);
    }

    #[test]
    fn port_override() {
        assert_eq!(AppConfig::default().with_port_override(Some("8080")).port, 8080);
        assert_eq!(AppConfig::default().with_port_override(Some("nope")).port, 3000);
        assert_eq!(AppConfig::default().with_port_override(None).port, 3000);
    }
}
